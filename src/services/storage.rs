// src/services/storage.rs
use crate::{
    error::{AppError, AppResult},
    validators::{self, UploadKind},
};
use axum::body::Bytes;
use std::path::{Path, PathBuf};

/// Ficheiro recebido num formulário multipart.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    /// Valida extensão e tamanho; devolve a extensão.
    pub fn validate(&self, kind: UploadKind) -> Result<String, String> {
        validators::validate_upload(&self.file_name, self.bytes.len(), kind)
    }
}

/// Grava fotos e documentos por baixo do diretório de media.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        MediaStorage { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Grava o ficheiro como `<kind>/<prefix>_<user_id>_<timestamp>.<ext>`
    /// e devolve o caminho relativo guardado na DB.
    pub async fn save(
        &self,
        kind: UploadKind,
        prefix: &str,
        user_id: i64,
        file: &UploadedFile,
    ) -> AppResult<String> {
        let ext = file
            .validate(kind)
            .map_err(|message| AppError::field(&file.field, message))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d%H%M%S%3f");
        let relative = format!("{}/{}_{}_{}.{}", kind.dir(), prefix, user_id, timestamp, ext);

        let dir = self.root.join(kind.dir());
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(self.root.join(&relative), &file.bytes).await?;

        tracing::info!("📁 Upload gravado: {} ({} bytes)", relative, file.bytes.len());
        Ok(relative)
    }

    /// Remove um ficheiro substituído; falhas só ficam no log.
    pub async fn remove(&self, relative: &str) {
        if relative.contains("..") {
            tracing::warn!("Caminho de media suspeito ignorado: {}", relative);
            return;
        }
        if let Err(e) = tokio::fs::remove_file(self.root.join(relative)).await {
            tracing::warn!("Não foi possível remover {}: {}", relative, e);
        }
    }

    /// URL pública (`/media/...`) com cada segmento codificado.
    pub fn public_url(relative: &str) -> String {
        let encoded: Vec<String> = relative
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("/media/{}", encoded.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, size: usize) -> UploadedFile {
        UploadedFile {
            field: "photo".into(),
            file_name: name.into(),
            bytes: Bytes::from(vec![7u8; size]),
        }
    }

    #[tokio::test]
    async fn saves_under_kind_directory() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(dir.path());

        let relative = storage
            .save(UploadKind::Photo, "photo", 42, &upload("eu.JPG", 16))
            .await
            .unwrap();
        assert!(relative.starts_with("photos/photo_42_"));
        assert!(relative.ends_with(".jpg"));
        assert_eq!(std::fs::read(dir.path().join(&relative)).unwrap().len(), 16);

        storage.remove(&relative).await;
        assert!(!dir.path().join(&relative).exists());
    }

    #[tokio::test]
    async fn rejects_wrong_extension_as_field_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(dir.path());
        let err = storage
            .save(UploadKind::Photo, "photo", 1, &upload("virus.exe", 4))
            .await
            .unwrap_err();
        match err {
            AppError::Validation(errors) => assert!(errors.contains("photo")),
            other => panic!("esperava validação, veio {:?}", other),
        }
    }

    #[test]
    fn public_url_encodes_segments() {
        assert_eq!(
            MediaStorage::public_url("photos/minha foto.png"),
            "/media/photos/minha%20foto.png"
        );
    }
}
