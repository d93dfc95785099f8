/// The form served at `/`. It only talks to the JSON endpoints.
pub const INDEX_HTML: &str = include_str!("../static/index.html");
