pub(crate) async fn stylesheet() -> axum::response::Response {
    const CSS_CONTENT: &str = include_str!("../static/style.css");
    axum::response::Response::builder()
        .status(200)
        .header("content-type", "text/css")
        .header("cache-control", "public, max-age=3600")
        .body(CSS_CONTENT.into())
        .unwrap()
}

pub(crate) async fn subscribe_script() -> axum::response::Response {
    const SUBSCRIBE_JS_CONTENT: &str = include_str!("../static/subscribe.js");
    axum::response::Response::builder()
        .status(200)
        .header("content-type", "application/javascript")
        .header("cache-control", "public, max-age=3600")
        .body(SUBSCRIBE_JS_CONTENT.into())
        .unwrap()
}

pub(crate) async fn admin_script() -> axum::response::Response {
    const ADMIN_JS_CONTENT: &str = include_str!("../static/admin.js");
    axum::response::Response::builder()
        .status(200)
        .header("content-type", "application/javascript")
        .header("cache-control", "public, max-age=3600")
        .body(ADMIN_JS_CONTENT.into())
        .unwrap()
}
