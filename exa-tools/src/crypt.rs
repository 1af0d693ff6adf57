//! Login password hashing and the reversible encoding used for stored secrets.

use std::ffi::CStr;

use anyhow::{bail, Error};

use proxmox_sys::linux::random_data;

// from libcrypt1, 'lib/crypt.h.in'
const CRYPT_OUTPUT_SIZE: usize = 384;
const CRYPT_MAX_PASSPHRASE_SIZE: usize = 512;
const CRYPT_DATA_RESERVED_SIZE: usize = 767;
const CRYPT_DATA_INTERNAL_SIZE: usize = 30720;

/// Prefixes of the `/etc/shadow` hash formats we accept as already hashed.
pub const SHADOW_PREFIXES: [&str; 5] = ["$1$", "$2a$", "$2y$", "$5$", "$6$"];

const PASSWORD_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

#[repr(C)]
struct crypt_data {
    output: [libc::c_char; CRYPT_OUTPUT_SIZE],
    setting: [libc::c_char; CRYPT_OUTPUT_SIZE],
    input: [libc::c_char; CRYPT_MAX_PASSPHRASE_SIZE],
    reserved: [libc::c_char; CRYPT_DATA_RESERVED_SIZE],
    initialized: libc::c_char,
    internal: [libc::c_char; CRYPT_DATA_INTERNAL_SIZE],
}

pub fn crypt(password: &[u8], salt: &[u8]) -> Result<String, Error> {
    #[link(name = "crypt")]
    extern "C" {
        #[link_name = "crypt_r"]
        fn __crypt_r(
            key: *const libc::c_char,
            salt: *const libc::c_char,
            data: *mut crypt_data,
        ) -> *mut libc::c_char;
    }

    let mut data: Box<crypt_data> = Box::new(unsafe { std::mem::zeroed() });
    for (i, c) in salt.iter().take(data.setting.len() - 1).enumerate() {
        data.setting[i] = *c as libc::c_char;
    }
    for (i, c) in password.iter().take(data.input.len() - 1).enumerate() {
        data.input[i] = *c as libc::c_char;
    }

    let res = unsafe {
        let status = __crypt_r(
            &data.input as *const _,
            &data.setting as *const _,
            &mut *data as *mut _,
        );
        if status.is_null() {
            bail!("internal error: crypt_r returned null pointer");
        }
        CStr::from_ptr(&data.output as *const _)
    };
    let res = String::from(res.to_str()?);
    // libxcrypt signals invalid settings with a hash starting with '*'
    if res.starts_with('*') {
        bail!("crypt_r failed - unsupported hash setting");
    }
    Ok(res)
}

/// Hash a login password into an `/etc/shadow` compatible SHA-512 (`$6$`) string.
pub fn hash_login_password(password: &str) -> Result<String, Error> {
    let salt = random_data(16)?;
    let salt = format!("$6${}$", base64::encode_config(salt, base64::CRYPT));

    crypt(password.as_bytes(), salt.as_bytes())
}

pub fn verify_login_password(password: &str, hashed: &str) -> Result<(), Error> {
    let verify = crypt(password.as_bytes(), hashed.as_bytes())?;
    if verify != hashed {
        bail!("invalid credentials");
    }
    Ok(())
}

pub fn is_hashed_login_password(text: &str) -> bool {
    SHADOW_PREFIXES.iter().any(|prefix| text.starts_with(prefix))
}

/// Result of inspecting a stored secret.
///
/// A plain text secret that happens to be valid base64 is classified as
/// `Encoded`. Stored values carry no marker, so that ambiguity cannot be
/// resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoding {
    /// Valid base64, carries the decoded text.
    Encoded(String),
    Plain,
}

pub fn classify_reversible(text: &str) -> Encoding {
    match base64::decode(text.trim()) {
        Ok(raw) => match String::from_utf8(raw) {
            Ok(decoded) => Encoding::Encoded(decoded),
            Err(_) => Encoding::Plain,
        },
        Err(_) => Encoding::Plain,
    }
}

/// Encode a secret unless it already is encoded.
pub fn encode_reversible(text: &str) -> String {
    let text = text.trim();
    match classify_reversible(text) {
        Encoding::Encoded(_) => text.to_string(),
        Encoding::Plain => base64::encode(text),
    }
}

/// Decode a secret, returning plain input unchanged.
pub fn decode_reversible(text: &str) -> String {
    match classify_reversible(text) {
        Encoding::Encoded(decoded) => decoded,
        Encoding::Plain => text.trim().to_string(),
    }
}

/// Random alphanumeric secret.
pub fn generate_password(len: usize) -> Result<String, Error> {
    // only accept bytes below the largest multiple of 62 (248)
    let limit = (256 / PASSWORD_CHARS.len() * PASSWORD_CHARS.len()) as u8;
    let mut password = String::with_capacity(len);
    while password.len() < len {
        for byte in random_data(len)? {
            if byte < limit && password.len() < len {
                password.push(PASSWORD_CHARS[byte as usize % PASSWORD_CHARS.len()] as char);
            }
        }
    }
    Ok(password)
}

/// Encoded 32 character secret, the default for buckets and BucketFS sync keys.
pub fn generate_encoded_password() -> Result<String, Error> {
    Ok(encode_reversible(&generate_password(32)?))
}

/// 40 upper case hex digits identifying a cluster node.
pub fn generate_node_uuid() -> Result<String, Error> {
    Ok(hex::encode_upper(random_data(20)?))
}

/// Random hex name, valid as an entity name.
pub fn generate_opaque_name() -> Result<String, Error> {
    Ok(hex::encode(random_data(16)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_login_password() -> Result<(), Error> {
        let first = hash_login_password("secret")?;
        let second = hash_login_password("secret")?;

        assert!(first.starts_with("$6$"));
        assert!(is_hashed_login_password(&first));
        assert_ne!(first, second);

        verify_login_password("secret", &first)?;
        verify_login_password("secret", &second)?;
        assert!(verify_login_password("wrong", &first).is_err());

        Ok(())
    }

    #[test]
    fn test_is_hashed_login_password() {
        assert!(is_hashed_login_password("$1$abc$def"));
        assert!(is_hashed_login_password("$2y$10$xyz"));
        assert!(!is_hashed_login_password("$3$abc"));
        assert!(!is_hashed_login_password("cleartext"));
    }

    #[test]
    fn test_reversible_encoding() {
        assert_eq!(classify_reversible("c2VjcmV0"), Encoding::Encoded("secret".into()));
        assert_eq!(classify_reversible("not base64!"), Encoding::Plain);

        assert_eq!(encode_reversible("secret!"), "c2VjcmV0IQ==");
        assert_eq!(encode_reversible("c2VjcmV0IQ=="), "c2VjcmV0IQ==");
        assert_eq!(decode_reversible(" c2VjcmV0IQ== "), "secret!");
        assert_eq!(decode_reversible("secret!"), "secret!");

        // plain text that is valid base64 stays as it is
        assert_eq!(classify_reversible("Zm9vYmFy"), Encoding::Encoded("foobar".into()));
        assert_eq!(encode_reversible("Zm9vYmFy"), "Zm9vYmFy");
        // decodes, but not to UTF-8
        assert_eq!(classify_reversible("abcd"), Encoding::Plain);
    }

    #[test]
    fn test_generators() -> Result<(), Error> {
        let password = generate_password(32)?;
        assert_eq!(password.len(), 32);
        assert!(password.bytes().all(|b| b.is_ascii_alphanumeric()));

        let encoded = generate_encoded_password()?;
        assert!(matches!(classify_reversible(&encoded), Encoding::Encoded(ref s) if s.len() == 32));

        let uuid = generate_node_uuid()?;
        assert_eq!(uuid.len(), 40);
        assert!(uuid.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b)));

        let name = generate_opaque_name()?;
        assert_eq!(name.len(), 32);
        assert!(name.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(name, generate_opaque_name()?);

        Ok(())
    }
}
