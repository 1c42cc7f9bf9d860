use crate::config::AUTH_BASE_PATH;

const PAGE_STYLE: &str = r#"
        * { box-sizing: border-box; margin: 0; padding: 0; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, "Helvetica Neue", Arial, sans-serif;
            background: #f3f5f7;
            min-height: 100vh;
            display: flex;
            align-items: center;
            justify-content: center;
            padding: 20px;
        }
        .card {
            background: white;
            border-radius: 12px;
            box-shadow: 0 10px 40px rgba(0, 0, 0, 0.12);
            max-width: 420px;
            width: 100%;
            padding: 36px;
            text-align: center;
        }
        h1 { color: #1f2933; font-size: 24px; margin-bottom: 24px; }
        p { color: #52606d; font-size: 14px; margin-bottom: 16px; }
        .btn {
            display: block;
            margin-top: 12px;
            padding: 12px 24px;
            border-radius: 8px;
            color: white;
            font-weight: 600;
            text-decoration: none;
        }
        .btn-discord { background-color: #5865f2; }
        .btn-igms { background-color: #ff5a5f; }
        .btn-default { background-color: #3e4c59; }
        .error {
            color: #a61b1b;
            background-color: #fde8e8;
            border-radius: 8px;
            padding: 12px;
            margin-bottom: 20px;
        }
"#;

/// Minimal HTML escaping for text placed in element bodies and attributes
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// User-facing text for an error kind (see `AuthError::error_kind`)
pub fn error_message(kind: &str) -> &'static str {
    match kind {
        "Configuration" => "There is a problem with the server configuration.",
        "UserNotFound" => "No matching host account was found for this sign-in.",
        "OAuthAccountNotLinked" => {
            "This email is already used by an account from another provider. Sign in the way you originally did."
        }
        "Verification" => "The sign-in link is no longer valid. Please start again.",
        "OAuthSignin" => "Could not start the sign-in with this provider.",
        _ => "Sign-in failed. Please try again.",
    }
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>{title} - HostDesk</title>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>{style}</style>
</head>
<body>
    <div class="card">
        {body}
    </div>
</body>
</html>"#,
        title = escape_html(title),
        style = PAGE_STYLE,
        body = body
    )
}

/// Sign-in page listing one button per provider, given as `(id, name)` pairs
pub fn sign_in_page_html(providers: &[(&str, &str)], error: Option<&str>) -> String {
    let mut body = String::from("<h1>Sign in to HostDesk</h1>");

    if let Some(kind) = error {
        body.push_str(&format!(
            r#"<div class="error">{}</div>"#,
            escape_html(error_message(kind))
        ));
    }

    for (id, name) in providers {
        let class = match *id {
            "discord" | "igms" => format!("btn-{}", id),
            _ => "btn-default".to_string(),
        };
        body.push_str(&format!(
            r#"<a href="{base}/signin/{id}" class="btn {class}">Sign in with {name}</a>"#,
            base = AUTH_BASE_PATH,
            id = escape_html(id),
            class = class,
            name = escape_html(name)
        ));
    }

    page("Sign in", &body)
}

pub fn error_page_html(kind: &str) -> String {
    let body = format!(
        r#"<h1>Sign-in error</h1>
        <p>{message}</p>
        <p><code>{kind}</code></p>
        <a href="{base}/signin" class="btn btn-default">Back to sign in</a>"#,
        message = escape_html(error_message(kind)),
        kind = escape_html(kind),
        base = AUTH_BASE_PATH
    );
    page("Error", &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_in_page_lists_providers() {
        let html = sign_in_page_html(&[("discord", "Discord"), ("igms", "IGMS")], None);
        assert!(html.contains(r#"href="/api/auth/signin/discord""#));
        assert!(html.contains(r#"href="/api/auth/signin/igms""#));
        assert!(html.contains("Sign in with IGMS"));
        assert!(!html.contains(r#"class="error""#));
    }

    #[test]
    fn test_error_kind_is_escaped() {
        let html = error_page_html("<script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("Sign-in failed. Please try again."));
    }

    #[test]
    fn test_sign_in_page_shows_error() {
        let html = sign_in_page_html(&[("igms", "IGMS")], Some("UserNotFound"));
        assert!(html.contains("No matching host account was found"));
    }
}
