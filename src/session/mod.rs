//! Session management: cookies, CSRF tokens and page metadata.

pub mod cookies;
pub mod metadata;
mod session;

pub use cookies::{Cookie, domain_matches, load_cookie_file, parse_cookie_header, parse_netscape_cookies};
pub use session::{CSRF_HEADER, Session};
