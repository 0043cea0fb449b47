//! HTML pages rendered by the gateway itself

/// Page shown with a 403 when the session's identity is not on the allow-list.
///
/// The identity comes straight from a cookie, so it is escaped before use.
pub fn unauthorized_html(identity: &str) -> String {
    let identity = html_escape::encode_text(identity);

    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Unauthorized</title></head>
<body>
  <div style="
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
    max-width: 600px;
    margin: 100px auto;
    padding: 2rem;
    text-align: center;
    border-radius: 8px;
    box-shadow: 0 2px 4px rgba(0,0,0,0.1);
    background: #fff;
  ">
    <h1 style="color: #e53e3e; margin-bottom: 1.5rem;">Unauthorized</h1>
    <p style="color: #4a5568; margin-bottom: 2rem; line-height: 1.6;">
      Your email <strong>{identity}</strong> is not authorized to access this content.
    </p>
    <a href="/logout" style="
      display: inline-block;
      background: #3182ce;
      color: white;
      padding: 0.75rem 1.5rem;
      text-decoration: none;
      border-radius: 4px;
      font-weight: 500;
    ">Login as different user</a>
  </div>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_the_identity_and_links_to_logout() {
        let page = unauthorized_html("user@other.com");
        assert!(page.contains("Unauthorized"));
        assert!(page.contains("<strong>user@other.com</strong>"));
        assert!(page.contains(r#"href="/logout""#));
    }

    #[test]
    fn escapes_markup_in_identity() {
        let page = unauthorized_html("<script>alert(1)</script>");
        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;"));
    }
}
