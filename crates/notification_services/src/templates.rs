//! Email bodies. Placeholders are written as `{name}` and substituted with
//! [`render`]; values that come from users must go through [`escape_html`]
//! before landing in an HTML body.

/// Shared layout wrapping every HTML email. Placeholders: `{app_name}`, `{title}`, `{content}`.
pub const LAYOUT_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <title>{title}</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
  <div style="background: linear-gradient(to right, #4CAF50, #45a049); padding: 20px; text-align: center;">
    <h1 style="color: white; margin: 0;">{title}</h1>
  </div>
  <div style="background-color: #f9f9f9; padding: 20px; border-radius: 0 0 5px 5px;">
    {content}
    <p>Best regards,<br>The {app_name} Team</p>
  </div>
  <div style="text-align: center; margin-top: 20px; color: #888; font-size: 0.8em;">
    <p>This is an automated message, please do not reply to this email.</p>
  </div>
</body>
</html>
"#;

/// Placeholders: `{name}`, `{code}`, `{minutes}`.
pub const ACCOUNT_VERIFICATION_CONTENT: &str = r#"
    <p>Hello {name},</p>
    <p>Thank you for signing up! Your verification code is:</p>
    <div style="text-align: center; margin: 30px 0;">
      <span style="font-size: 32px; font-weight: bold; letter-spacing: 5px; color: #4CAF50;">{code}</span>
    </div>
    <p>Enter this code on the verification page to complete your registration.</p>
    <p>This code will expire in {minutes} minutes for security reasons.</p>
    <p>If you didn't create an account with us, please ignore this email.</p>
"#;

/// Placeholders: `{name}`, `{app_name}`.
pub const WELCOME_CONTENT: &str = r#"
    <p>Dear {name},</p>
    <p>Welcome to {app_name}! Your email is verified and your account is ready.</p>
    <p>Thank you for joining us!</p>
"#;

/// Placeholders: `{code}`, `{minutes}`.
pub const PASSWORD_RESET_CONTENT: &str = r#"
    <p>Hello,</p>
    <p>We received a request to reset your password. Your reset code is:</p>
    <div style="text-align: center; margin: 30px 0;">
      <span style="font-size: 32px; font-weight: bold; letter-spacing: 5px; color: #4CAF50;">{code}</span>
    </div>
    <p>This code will expire in {minutes} minutes.</p>
    <p>If you didn't request a password reset, please ignore this email.</p>
"#;

/// No placeholders.
pub const PASSWORD_RESET_SUCCESS_CONTENT: &str = r#"
    <p>Hello,</p>
    <p>Your password has been reset successfully. All existing sessions were signed out.</p>
    <p>If you did not initiate this change, please contact support immediately.</p>
"#;

/// Placeholders: `{name}`, `{spot}`, `{check_in}`, `{check_out}`, `{code}`, `{minutes}`.
pub const BOOKING_VERIFICATION_CONTENT: &str = r#"
    <p>Hello {name},</p>
    <p>You requested a stay at <strong>{spot}</strong> from {check_in} to {check_out}.</p>
    <p>Confirm the booking with this code:</p>
    <div style="text-align: center; margin: 30px 0;">
      <span style="font-size: 32px; font-weight: bold; letter-spacing: 5px; color: #4CAF50;">{code}</span>
    </div>
    <p>The code expires in {minutes} minutes. Unconfirmed bookings are released automatically.</p>
"#;

/// Placeholders: `{name}`, `{spot}`, `{check_in}`, `{check_out}`.
pub const BOOKING_CONFIRMED_CONTENT: &str = r#"
    <p>Hello {name},</p>
    <p>Your booking at <strong>{spot}</strong> from {check_in} to {check_out} is confirmed.</p>
    <p>You can now complete the payment from your bookings page.</p>
"#;

/// Placeholders: `{name}`, `{email}`, `{subject}`, `{message}`.
pub const CONTACT_FORM_CONTENT: &str = r#"
    <h2 style="color: #333;">New Contact Form Message</h2>
    <p><strong>From:</strong> {name}</p>
    <p><strong>User Email:</strong> {email}</p>
    <p><strong>Subject:</strong> {subject}</p>
    <div style="margin-top: 20px;">
      <strong>Message:</strong>
      <p style="background: white; padding: 15px; border-left: 4px solid #4CAF50; margin: 10px 0;">{message}</p>
    </div>
"#;

/// Replaces every `{key}` in `template` with its value.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{}}}", key), value)
    })
}

/// Wraps rendered content in the shared layout.
pub fn layout(app_name: &str, title: &str, content: &str) -> String {
    render(
        LAYOUT_HTML,
        &[("app_name", app_name), ("title", title), ("content", content)],
    )
}

/// Escapes the characters that are significant in HTML text and attributes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_all_occurrences() {
        let out = render("{a}-{b}-{a}", &[("a", "1"), ("b", "2")]);
        assert_eq!(out, "1-2-1");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x")</script> & 'y'"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt; &amp; &#x27;y&#x27;"
        );
    }

    #[test]
    fn test_layout_embeds_content() {
        let html = layout("RVnBo", "Hi", "<p>body</p>");
        assert!(html.contains("<title>Hi</title>"));
        assert!(html.contains("<p>body</p>"));
        assert!(html.contains("The RVnBo Team"));
    }
}
