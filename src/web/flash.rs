// src/web/flash.rs
//! Mensagens de uma só leitura entre um POST e o GET seguinte, num cookie assinado.
use tower_cookies::{Cookie, Cookies, Key};

const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    fn encode(&self) -> String {
        format!("{}:{}", self.kind.as_str(), urlencoding::encode(&self.message))
    }

    fn decode(value: &str) -> Option<Flash> {
        let (kind, message) = value.split_once(':')?;
        let kind = match kind {
            "success" => FlashKind::Success,
            "error" => FlashKind::Error,
            _ => return None,
        };
        let message = urlencoding::decode(message).ok()?.into_owned();
        Some(Flash { kind, message })
    }
}

fn flash_cookie(value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(FLASH_COOKIE, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie
}

pub fn success(cookies: &Cookies, key: &Key, message: impl Into<String>) {
    set(cookies, key, FlashKind::Success, message.into());
}

pub fn error(cookies: &Cookies, key: &Key, message: impl Into<String>) {
    set(cookies, key, FlashKind::Error, message.into());
}

fn set(cookies: &Cookies, key: &Key, kind: FlashKind, message: String) {
    let flash = Flash { kind, message };
    cookies.signed(key).add(flash_cookie(flash.encode()));
}

/// Lê e apaga a mensagem pendente. Cookies adulterados são ignorados.
pub fn take(cookies: &Cookies, key: &Key) -> Option<Flash> {
    let signed = cookies.signed(key);
    let cookie = signed.get(FLASH_COOKIE)?;
    signed.remove(flash_cookie(String::new()));
    Flash::decode(cookie.value())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_with_accents_and_separators_survive_encoding() {
        let flash = Flash {
            kind: FlashKind::Error,
            message: "Não foi possível: tente; de novo, por favor".into(),
        };
        assert_eq!(Flash::decode(&flash.encode()), Some(flash));
    }

    #[test]
    fn unknown_kind_is_ignored() {
        assert_eq!(Flash::decode("warning:oi"), None);
        assert_eq!(Flash::decode("sem-separador"), None);
    }
}
