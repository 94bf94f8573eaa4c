use crate::{CliError, Result};

/// Seconds the key stays authorized; long enough for the SSH handshake.
const AUTHORIZED_SECONDS: u32 = 15;

/// Usernames are interpolated into a shell script, so only portable
/// login-name characters are allowed.
pub fn validate_username(username: &str) -> Result<()> {
    let mut chars = username.chars();
    let valid_first = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if !valid_first || !valid_rest || username.len() > 32 {
        return Err(CliError::InvalidUsername(username.to_string()));
    }
    Ok(())
}

/// Shell script that authorizes `public_key` for `username` briefly and then
/// removes it again. Refuses to run if the key is already authorized.
///
/// `public_key` must already have passed `keys::validate_public_key`.
pub fn authorize_key_script(username: &str, public_key: &str) -> Result<String> {
    validate_username(username)?;

    Ok([
        format!(
            "u=$(getent passwd {user}) && x=$(echo $u |cut -d: -f6) || exit 1",
            user = username
        ),
        format!(
            "install -d -m700 -o{user} ${{x}}/.ssh; grep '{key}' ${{x}}/.ssh/authorized_keys && exit 1",
            user = username,
            key = public_key
        ),
        format!(
            "printf '\\n{key}'|tee -a ${{x}}/.ssh/authorized_keys && sleep {secs}",
            key = public_key,
            secs = AUTHORIZED_SECONDS
        ),
        format!(
            "sed -i s,'{key}',, ${{x}}/.ssh/authorized_keys && sed -i '/^$/d' ${{x}}/.ssh/authorized_keys",
            key = public_key
        ),
    ]
    .join("\n"))
}
