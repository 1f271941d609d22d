// src/web/form_data.rs
use crate::{
    error::{AppError, AppResult},
    services::storage::UploadedFile,
};
use axum::extract::Multipart;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// Campos de texto e ficheiros de um formulário (multipart ou urlencoded).
#[derive(Debug, Default)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub files: Vec<UploadedFile>,
}

impl FormData {
    pub fn from_fields(fields: HashMap<String, String>) -> Self {
        FormData { fields, files: Vec::new() }
    }

    /// Lê o corpo multipart todo. Valores repetidos do mesmo campo são
    /// juntados com `,`; inputs de ficheiro vazios são ignorados.
    pub async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = FormData::default();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field.bytes().await.map_err(multipart_error)?;
                    if file_name.is_empty() || bytes.is_empty() {
                        continue;
                    }
                    tracing::debug!("Multipart: ficheiro '{}' em {} ({} bytes)", file_name, name, bytes.len());
                    form.files.push(UploadedFile { field: name, file_name, bytes });
                }
                None => {
                    let value = field.text().await.map_err(multipart_error)?;
                    form.fields
                        .entry(name)
                        .and_modify(|existing| {
                            existing.push(',');
                            existing.push_str(&value);
                        })
                        .or_insert(value);
                }
            }
        }
        Ok(form)
    }

    pub fn take_file(&mut self, field: &str) -> Option<UploadedFile> {
        let index = self.files.iter().position(|f| f.field == field)?;
        Some(self.files.remove(index))
    }

    /// Converte os campos de texto no DTO do formulário.
    pub fn decode<T: DeserializeOwned>(&self) -> AppResult<T> {
        decode_fields(&self.fields)
    }

    /// Valores para voltar a preencher o formulário (sem senhas).
    pub fn echo(&self) -> HashMap<String, String> {
        self.fields
            .iter()
            .filter(|(name, _)| !name.contains("password"))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

pub fn decode_fields<T: DeserializeOwned>(fields: &HashMap<String, String>) -> AppResult<T> {
    let object: serde_json::Map<String, serde_json::Value> = fields
        .iter()
        .map(|(name, value)| (name.clone(), serde_json::Value::String(value.clone())))
        .collect();
    serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| {
        tracing::warn!("Formulário com formato inesperado: {}", e);
        AppError::field("form", "Dados do formulário inválidos")
    })
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    tracing::warn!("Erro ao ler multipart: {}", e);
    AppError::field("form", "Não foi possível ler o formulário enviado")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::registration::StudentRegistration;

    #[test]
    fn flattened_dto_decodes_from_text_fields() {
        let fields: HashMap<String, String> = [
            ("email", "aluno@email.com"),
            ("password", "segredo1"),
            ("full_name", "Aluno Teste"),
            ("cep", "01310-100"),
            ("city", "São Paulo"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let form: StudentRegistration = decode_fields(&fields).unwrap();
        assert_eq!(form.account.email, "aluno@email.com");
        assert_eq!(form.address.cep, "01310-100");
        assert_eq!(form.address.city, "São Paulo");
        assert!(form.cpf.is_empty());
    }

    #[test]
    fn echo_drops_passwords() {
        let mut form = FormData::default();
        form.fields.insert("email".into(), "a@b.com".into());
        form.fields.insert("password".into(), "x".into());
        form.fields.insert("password_confirm".into(), "x".into());
        let echo = form.echo();
        assert_eq!(echo.len(), 1);
        assert_eq!(echo["email"], "a@b.com");
    }
}
