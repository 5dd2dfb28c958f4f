//! HTML pages served by the loopback callback server

/// Escape text for inclusion in an HTML body
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn page(title: &str, content: &str, close_after_ms: Option<u32>) -> String {
    let script = close_after_ms
        .map(|ms| format!("<script>setTimeout(() => window.close(), {});</script>", ms))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{} - mailsort</title>
    <style>
        body {{
            font-family: system-ui, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            height: 100vh;
            margin: 0;
            background: #fafafa;
        }}
        .container {{
            padding: 2rem;
            background: white;
            border-radius: 8px;
            box-shadow: 0 2px 8px rgba(0,0,0,0.1);
        }}
        h1 {{ color: #333; }}
        p, li {{ color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>{}</h1>
        {}
    </div>
    {}
</body>
</html>"#,
        title, title, content, script
    )
}

pub(crate) fn success_page(code: &str) -> String {
    let preview: String = code.chars().take(15).collect();
    page(
        "Authentication Successful",
        &format!(
            "<p>You can close this window and return to the terminal.</p>\
             <p><small>Code received: {}...</small></p>",
            escape_html(&preview)
        ),
        Some(3000),
    )
}

pub(crate) fn error_page(error: &str, description: Option<&str>) -> String {
    page(
        "Authentication Error",
        &format!(
            "<p><strong>Error:</strong> {}</p>\
             <p><strong>Description:</strong> {}</p>\
             <p>Return to the terminal and restart the process.</p>",
            escape_html(error),
            escape_html(description.unwrap_or("No description"))
        ),
        Some(5000),
    )
}

pub(crate) fn missing_code_page(target: &str) -> String {
    page(
        "Missing Authorization Code",
        &format!(
            "<p>The request does not contain an authorization code.</p>\
             <p>URL received: <code>{}</code></p>\
             <p>Check your Azure app registration (redirect URI and permissions).</p>",
            escape_html(target)
        ),
        Some(5000),
    )
}

pub(crate) fn help_page() -> String {
    page(
        "Microsoft Graph Authentication Server",
        "<p>This server is waiting for a Microsoft authentication callback.</p>\
         <p>If you see this page, authentication has not yet occurred.</p>\
         <p><strong>Instructions:</strong></p>\
         <ol>\
           <li>Close this window</li>\
           <li>Return to the terminal</li>\
           <li>Open the Microsoft sign-in link printed there</li>\
         </ol>",
        None,
    )
}
