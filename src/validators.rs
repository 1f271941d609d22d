// src/validators.rs
//! Validações de campo (CPF, CEP, placa, RENAVAM, telefone, uploads...).
//!
//! As funções `validate_*` devolvem a mensagem em português que vai para o
//! formulário; as funções `*_rule` adaptam-nas ao crate `validator`.

use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;
use validator::ValidationError;

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
pub const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];
pub const MIN_VEHICLE_YEAR: i32 = 1950;
pub const ADULT_AGE: u32 = 18;

lazy_static! {
    /// Placas no padrão antigo (AAA9999) ou Mercosul (AAA9A99), já normalizadas
    pub static ref REGEX_IS_MERCOSUL_OR_BR_VEHICLE_PLATE: Regex =
        Regex::new(r"^[A-Z]{3}[0-9][A-Z0-9][0-9]{2}$").unwrap();
    //
    pub static ref REGEX_ONLY_DIGITS: Regex = Regex::new(r"^[0-9]+$").unwrap();
    //
    pub static ref REGEX_UF: Regex = Regex::new(r"^[A-Z]{2}$").unwrap();
}

/// Remove tudo o que não for dígito ("529.982.247-25" -> "52998224725").
pub fn normalize_digits(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn digits_of(value: &str) -> Vec<u32> {
    value.chars().filter_map(|c| c.to_digit(10)).collect()
}

pub fn validate_cpf(value: &str) -> Result<String, &'static str> {
    let cpf = normalize_digits(value);
    if cpf.len() != 11 {
        return Err("CPF deve ter 11 dígitos");
    }
    let digits = digits_of(&cpf);
    if digits.iter().all(|d| *d == digits[0]) {
        return Err("CPF inválido");
    }

    let check = |len: usize| -> u32 {
        let sum: u32 = digits[..len]
            .iter()
            .enumerate()
            .map(|(i, d)| d * (len as u32 + 1 - i as u32))
            .sum();
        (sum * 10) % 11 % 10
    };

    if check(9) != digits[9] || check(10) != digits[10] {
        return Err("CPF inválido");
    }
    Ok(cpf)
}

pub fn validate_cep(value: &str) -> Result<String, &'static str> {
    let trimmed = value.trim();
    let cep = normalize_digits(trimmed);
    let only_allowed = trimmed.chars().all(|c| c.is_ascii_digit() || c == '-');
    if cep.len() != 8 || !only_allowed {
        return Err("CEP inválido. Use o formato 00000-000");
    }
    Ok(cep)
}

/// Formata um CEP normalizado como `00000-000`.
pub fn format_cep(cep: &str) -> String {
    if cep.len() == 8 {
        format!("{}-{}", &cep[..5], &cep[5..])
    } else {
        cep.to_string()
    }
}

pub fn validate_plate(value: &str) -> Result<String, &'static str> {
    let plate: String = value
        .trim()
        .chars()
        .filter(|c| *c != '-')
        .collect::<String>()
        .to_ascii_uppercase();
    if REGEX_IS_MERCOSUL_OR_BR_VEHICLE_PLATE.is_match(&plate) {
        Ok(plate)
    } else {
        Err("Placa deve estar no formato AAA9999 ou AAA9A99")
    }
}

pub fn validate_renavam(value: &str) -> Result<String, &'static str> {
    let raw = value.trim();
    if raw.is_empty() || !REGEX_ONLY_DIGITS.is_match(raw) || raw.len() > 11 {
        return Err("RENAVAM deve conter até 11 dígitos");
    }
    let renavam = format!("{:0>11}", raw);
    let digits = digits_of(&renavam);

    const WEIGHTS: [u32; 10] = [3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
    let sum: u32 = digits[..10].iter().zip(WEIGHTS).map(|(d, w)| d * w).sum();
    let check = match (sum * 10) % 11 {
        10 => 0,
        d => d,
    };

    if check != digits[10] {
        return Err("RENAVAM inválido");
    }
    Ok(renavam)
}

pub fn validate_phone(value: &str) -> Result<String, &'static str> {
    let phone = value.trim();
    if phone.is_empty() {
        return Err("Telefone é obrigatório");
    }
    if normalize_digits(phone).len() < 10 {
        return Err("Telefone inválido. Use o formato (XX) XXXXX-XXXX");
    }
    Ok(phone.to_string())
}

/// CNH: 11 dígitos.
pub fn validate_cnh(value: &str) -> Result<String, &'static str> {
    let cnh = normalize_digits(value);
    if cnh.len() != 11 {
        return Err("CNH deve ter 11 dígitos");
    }
    Ok(cnh)
}

pub fn validate_vehicle_year(year: i32, today: NaiveDate) -> Result<i32, &'static str> {
    if year < MIN_VEHICLE_YEAR || year > today.year() + 1 {
        return Err("Ano do veículo fora do intervalo permitido");
    }
    Ok(year)
}

pub fn validate_adult(birth_date: NaiveDate, today: NaiveDate) -> Result<NaiveDate, &'static str> {
    match today.years_since(birth_date) {
        Some(age) if age >= ADULT_AGE => Ok(birth_date),
        Some(_) => Err("É necessário ter pelo menos 18 anos"),
        None => Err("Data de nascimento no futuro"),
    }
}

/// UF com duas letras (SP, RJ...).
pub fn validate_uf(value: &str) -> Result<String, &'static str> {
    let uf = value.trim().to_ascii_uppercase();
    if REGEX_UF.is_match(&uf) {
        Ok(uf)
    } else {
        Err("Estado deve ser a sigla com 2 letras")
    }
}

/// Categorias de CNH aceites ("A", "B", "AB"); devolve-as ordenadas e sem repetições.
pub fn normalize_categories(value: &str) -> Result<String, &'static str> {
    let mut cats: Vec<char> = value
        .to_ascii_uppercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    cats.sort_unstable();
    cats.dedup();
    if cats.is_empty() || cats.iter().any(|c| *c != 'A' && *c != 'B') {
        return Err("Categorias devem ser A e/ou B");
    }
    Ok(cats.into_iter().collect())
}

/// Datas de formulário: `2000-12-31` (input date) ou `31/12/2000`.
pub fn parse_form_date(value: &str) -> Result<NaiveDate, &'static str> {
    let value = value.trim();
    if value.is_empty() {
        return Err("Data é obrigatória");
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%d/%m/%Y"))
        .map_err(|_| "Data inválida")
}

/// Tipo de ficheiro enviado, com as suas regras de extensão.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Photo,
    Document,
}

impl UploadKind {
    pub fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            UploadKind::Photo => PHOTO_EXTENSIONS,
            UploadKind::Document => DOCUMENT_EXTENSIONS,
        }
    }

    pub fn dir(self) -> &'static str {
        match self {
            UploadKind::Photo => "photos",
            UploadKind::Document => "documents",
        }
    }
}

/// Verifica extensão e tamanho de um upload; devolve a extensão em minúsculas.
pub fn validate_upload(file_name: &str, size: usize, kind: UploadKind) -> Result<String, String> {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let allowed = kind.allowed_extensions();
    if !allowed.contains(&ext.as_str()) {
        return Err(format!(
            "Formato de arquivo não permitido: {}. Use apenas {}",
            if ext.is_empty() { "(sem extensão)" } else { ext.as_str() },
            allowed.join(", ").to_ascii_uppercase()
        ));
    }
    if size > MAX_UPLOAD_BYTES {
        return Err("Arquivo muito grande. Máximo: 5MB".to_string());
    }
    Ok(ext)
}

// --- Regras para o crate `validator` ---

fn rule_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

pub fn required_rule(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(rule_error("required", "Campo obrigatório"));
    }
    Ok(())
}

pub fn full_name_rule(value: &str) -> Result<(), ValidationError> {
    if value.trim().chars().count() < 2 {
        return Err(rule_error("full_name", "Nome deve ter pelo menos 2 caracteres"));
    }
    Ok(())
}

pub fn date_rule(value: &str) -> Result<(), ValidationError> {
    parse_form_date(value).map(|_| ()).map_err(|m| rule_error("date", m))
}

pub fn cpf_rule(value: &str) -> Result<(), ValidationError> {
    validate_cpf(value).map(|_| ()).map_err(|m| rule_error("cpf", m))
}

pub fn cep_rule(value: &str) -> Result<(), ValidationError> {
    validate_cep(value).map(|_| ()).map_err(|m| rule_error("cep", m))
}

pub fn phone_rule(value: &str) -> Result<(), ValidationError> {
    validate_phone(value).map(|_| ()).map_err(|m| rule_error("phone", m))
}

pub fn cnh_rule(value: &str) -> Result<(), ValidationError> {
    validate_cnh(value).map(|_| ()).map_err(|m| rule_error("cnh", m))
}

pub fn uf_rule(value: &str) -> Result<(), ValidationError> {
    validate_uf(value).map(|_| ()).map_err(|m| rule_error("state", m))
}

pub fn categories_rule(value: &str) -> Result<(), ValidationError> {
    normalize_categories(value)
        .map(|_| ())
        .map_err(|m| rule_error("categories", m))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn cpf_accepts_formatted_and_plain() {
        assert_eq!(validate_cpf("529.982.247-25").unwrap(), "52998224725");
        assert_eq!(validate_cpf("11144477735").unwrap(), "11144477735");
    }

    #[test]
    fn cpf_rejects_bad_check_digit_and_repeated_digits() {
        assert_eq!(validate_cpf("529.982.247-24"), Err("CPF inválido"));
        assert_eq!(validate_cpf("111.111.111-11"), Err("CPF inválido"));
        assert_eq!(validate_cpf("1234"), Err("CPF deve ter 11 dígitos"));
    }

    #[test]
    fn cep_formats() {
        assert_eq!(validate_cep("01001-000").unwrap(), "01001000");
        assert_eq!(validate_cep("01001000").unwrap(), "01001000");
        assert!(validate_cep("0100-1000x").is_err());
        assert!(validate_cep("1234567").is_err());
        assert_eq!(format_cep("01001000"), "01001-000");
    }

    #[test]
    fn plates_old_and_mercosul() {
        assert_eq!(validate_plate("abc-1234").unwrap(), "ABC1234");
        assert_eq!(validate_plate("BRA2E19").unwrap(), "BRA2E19");
        assert!(validate_plate("AB12345").is_err());
        assert!(validate_plate("ABC12345").is_err());
    }

    #[test]
    fn renavam_check_digit() {
        assert_eq!(validate_renavam("00639884962").unwrap(), "00639884962");
        assert_eq!(validate_renavam("639884962").unwrap(), "00639884962");
        assert_eq!(validate_renavam("12345678900").unwrap(), "12345678900");
        assert_eq!(validate_renavam("00639884963"), Err("RENAVAM inválido"));
        assert!(validate_renavam("12a45678900").is_err());
    }

    #[test]
    fn phone_needs_ten_digits() {
        assert!(validate_phone("(11) 98765-4321").is_ok());
        assert!(validate_phone("(11) 8765-432").is_err());
        assert_eq!(validate_phone("  "), Err("Telefone é obrigatório"));
    }

    #[test]
    fn adult_on_birthday() {
        let today = date(2026, 10, 19);
        assert!(validate_adult(date(2008, 10, 19), today).is_ok());
        assert!(validate_adult(date(2008, 10, 20), today).is_err());
        assert!(validate_adult(date(2030, 1, 1), today).is_err());
    }

    #[test]
    fn vehicle_year_range() {
        let today = date(2026, 10, 19);
        assert!(validate_vehicle_year(2027, today).is_ok());
        assert!(validate_vehicle_year(2028, today).is_err());
        assert!(validate_vehicle_year(1949, today).is_err());
    }

    #[test]
    fn categories_are_normalized() {
        assert_eq!(normalize_categories("b,a").unwrap(), "AB");
        assert_eq!(normalize_categories("B").unwrap(), "B");
        assert!(normalize_categories("C").is_err());
        assert!(normalize_categories("").is_err());
    }

    #[test]
    fn form_dates_accept_both_formats() {
        assert_eq!(parse_form_date("2000-12-31").unwrap(), date(2000, 12, 31));
        assert_eq!(parse_form_date("31/12/2000").unwrap(), date(2000, 12, 31));
        assert_eq!(parse_form_date(""), Err("Data é obrigatória"));
        assert_eq!(parse_form_date("31-12-2000"), Err("Data inválida"));
    }

    #[test]
    fn upload_rules() {
        assert_eq!(validate_upload("Foto.PNG", 10, UploadKind::Photo).unwrap(), "png");
        assert!(validate_upload("cnh.pdf", 10, UploadKind::Photo).is_err());
        assert_eq!(validate_upload("cnh.pdf", 10, UploadKind::Document).unwrap(), "pdf");
        assert!(validate_upload("foto.jpg", MAX_UPLOAD_BYTES + 1, UploadKind::Photo).is_err());
        assert!(validate_upload("semextensao", 1, UploadKind::Photo).is_err());
    }
}
