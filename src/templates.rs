use askama::Template;
use askama_web::WebTemplate;

#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
pub(crate) struct LoginTemplate {
    pub(crate) app_name: String,
    pub(crate) error: String,
    pub(crate) next: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "lists.html")]
pub(crate) struct ListsTemplate {
    pub(crate) app_name: String,
    pub(crate) user_name: String,
    pub(crate) is_admin: bool,
    pub(crate) configured: bool,
    pub(crate) rows: Vec<ListRow>,
}

pub(crate) struct ListRow {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) subscribed: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "admin.html")]
pub(crate) struct AdminTemplate {
    pub(crate) app_name: String,
    pub(crate) api_key: String,
    pub(crate) form_token: String,
    pub(crate) rows: Vec<AdminRow>,
}

pub(crate) struct AdminRow {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) enabled: bool,
    pub(crate) description: String,
}
