//! Signature-agnostic JWT claim decoding, carried from the teacher's
//! `utils::jwt`/`google_oauth::utils` helpers: OAuth refresh responses for
//! Google-backed providers carry an `id_token` whose payload segment is the
//! only place the account email shows up, and nothing downstream needs to
//! verify the signature (the access token itself is the trust boundary).

use base64::Engine as _;
use serde_json::Value;

/// Base64url-decodes a JWT's payload segment and parses it as JSON. Returns
/// `None` for anything that isn't a well-formed three-segment JWT.
pub fn decode_claims(jwt: &str) -> Option<Value> {
    let payload_b64 = jwt.split('.').nth(1)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE.decode(payload_b64))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Pulls the `email` claim out of an `id_token`, if present, and inserts it
/// into `token_value` under `email` so `Auth::apply_oauth_patch`'s caller
/// can fold it into the record's label.
pub fn attach_email_from_id_token(token_value: &mut Value) {
    let email = token_value
        .get("id_token")
        .and_then(Value::as_str)
        .and_then(decode_claims)
        .and_then(|claims| claims.get("email").and_then(Value::as_str).map(str::to_owned));

    if let (Some(obj), Some(email)) = (token_value.as_object_mut(), email) {
        obj.insert("email".to_string(), Value::String(email));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_jwt(claims: &Value) -> String {
        let header = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(b"{}");
        let payload =
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn decode_claims_reads_payload_segment() {
        let jwt = fake_jwt(&serde_json::json!({"email": "alice@example.test"}));
        let claims = decode_claims(&jwt).unwrap();
        assert_eq!(claims["email"], "alice@example.test");
    }

    #[test]
    fn decode_claims_rejects_malformed_input() {
        assert!(decode_claims("not-a-jwt").is_none());
    }

    #[test]
    fn attach_email_inserts_claim_from_id_token() {
        let jwt = fake_jwt(&serde_json::json!({"email": "bob@example.test"}));
        let mut value = serde_json::json!({"access_token": "tok", "id_token": jwt});
        attach_email_from_id_token(&mut value);
        assert_eq!(value["email"], "bob@example.test");
    }

    #[test]
    fn attach_email_is_noop_without_id_token() {
        let mut value = serde_json::json!({"access_token": "tok"});
        attach_email_from_id_token(&mut value);
        assert!(value.get("email").is_none());
    }
}
