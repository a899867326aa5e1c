//! Password reset tokens
//!
//! A token is `<timestamp base36>-<hex HMAC-SHA256>`. The MAC covers the user
//! id, email, current password hash and the timestamp, so a token stops working
//! once the password changes or the timeout passes. Nothing is stored
//! server-side.

use chrono::{DateTime, Utc};
use data_encoding::{BASE64URL_NOPAD, HEXLOWER};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::models::User;

type HmacSha256 = Hmac<Sha256>;

/// Encode a user id for use in a reset link
pub fn encode_uid(id: i64) -> String {
    BASE64URL_NOPAD.encode(id.to_string().as_bytes())
}

/// Decode a reset-link user id; `None` when malformed
pub fn decode_uid(uid: &str) -> Option<i64> {
    let bytes = BASE64URL_NOPAD.decode(uid.as_bytes()).ok()?;
    std::str::from_utf8(&bytes).ok()?.parse().ok()
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Issues and checks reset tokens
pub struct ResetTokenGenerator {
    secret: Vec<u8>,
    timeout_secs: i64,
}

impl ResetTokenGenerator {
    pub fn new(secret: &str, timeout_secs: i64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            timeout_secs,
        }
    }

    pub fn make_token(&self, user: &User, now: DateTime<Utc>) -> anyhow::Result<String> {
        let ts = now.timestamp().max(0) as u64;
        let mac = self.mac(user, ts)?.finalize().into_bytes();
        Ok(format!("{}-{}", to_base36(ts), HEXLOWER.encode(&mac)))
    }

    pub fn check_token(&self, user: &User, token: &str, now: DateTime<Utc>) -> bool {
        let Some((ts_part, mac_part)) = token.split_once('-') else {
            return false;
        };
        let Ok(ts) = u64::from_str_radix(ts_part, 36) else {
            return false;
        };
        let Ok(expected) = HEXLOWER.decode(mac_part.as_bytes()) else {
            return false;
        };
        let Ok(mac) = self.mac(user, ts) else {
            return false;
        };
        if mac.verify_slice(&expected).is_err() {
            return false;
        }
        let age = now.timestamp() - ts as i64;
        (0..=self.timeout_secs).contains(&age)
    }

    fn mac(&self, user: &User, ts: u64) -> anyhow::Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| anyhow::anyhow!("Invalid reset token key: {}", e))?;
        mac.update(format!("{}|{}|{}|{}", user.id, user.email, user.password_hash, ts).as_bytes());
        Ok(mac)
    }
}
