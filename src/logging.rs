/// Render a secret for logs: the first two characters followed by `***`.
/// Short secrets are fully masked.
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return "<unset>".to_string();
    }
    if secret.chars().count() <= 6 {
        return "***".to_string();
    }
    let prefix: String = secret.chars().take(2).collect();
    format!("{}***", prefix)
}
