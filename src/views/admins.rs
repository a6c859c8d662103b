//! JSON editing routes. Mounted under `/admin` only when `admin_api` is set;
//! access control belongs to whatever sits in front of the server.

use crate::{
    config::PagesConfig,
    error::{PageError, Result},
    models::{Page, PageEntry, Redirect},
    util::{self, SLUG_MAX_LENGTH},
    PersistDatabase,
};
use diesel::sqlite::SqliteConnection;
use rocket::{
    delete, get, post, put,
    response::status::{Created, NoContent},
    serde::{json::Json, Deserialize},
    State,
};

const TITLE_MAX_LENGTH: usize = 200;

fn invalid(message: String) -> PageError {
    log::warn!("rejected edit: {}", message);
    PageError::Invalid(message)
}

#[derive(Deserialize, Debug)]
#[serde(crate = "rocket::serde")]
pub struct PageForm {
    #[serde(default)]
    pub parent_id: Option<i32>,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub author: Option<String>,
    /// Left out or blank to derive it from the title.
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub active: bool,
}

impl PageForm {
    /// Checks that need no database: required fields, slug shape and the
    /// parent allow-list. `page_id` is the page being edited, if any.
    fn validate(&self, config: &PagesConfig, page_id: Option<i32>) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(invalid("title is required".to_owned()));
        }
        if self.title.chars().count() > TITLE_MAX_LENGTH {
            return Err(invalid(format!(
                "title is longer than {} characters",
                TITLE_MAX_LENGTH
            )));
        }
        if let Some(slug) = self.slug.as_deref().map(str::trim) {
            let well_formed = slug
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !well_formed || slug.len() > SLUG_MAX_LENGTH {
                return Err(invalid(format!("{:?} is not a valid slug", slug)));
            }
        }
        // a new page, or a cleared slug, takes its slug from the title
        let derives_slug = match self.slug.as_deref() {
            Some(slug) => slug.trim().is_empty(),
            None => page_id.is_none(),
        };
        if derives_slug && util::slug_for(&self.title).is_empty() {
            return Err(invalid(format!(
                "{:?} has no letters or digits to build a slug from; give one explicitly",
                self.title.trim()
            )));
        }
        if let Some(parent_id) = self.parent_id {
            if page_id == Some(parent_id) {
                return Err(invalid("a page cannot be its own parent".to_owned()));
            }
            if !config.is_allowed_parent(parent_id) {
                return Err(invalid(format!("page {} is not a section", parent_id)));
            }
        }
        Ok(())
    }

    fn check_parent_exists(&self, connection: &mut SqliteConnection) -> Result<()> {
        match self.parent_id {
            Some(parent_id) => match PageEntry::by_id(connection, parent_id) {
                Ok(_) => Ok(()),
                Err(diesel::result::Error::NotFound) => {
                    Err(invalid(format!("parent page {} does not exist", parent_id)))
                }
                Err(err) => Err(err.into()),
            },
            None => Ok(()),
        }
    }

    fn apply(self, page: &mut Page) {
        page.parent_id = self.parent_id;
        page.title = self.title.trim().to_owned();
        page.body = self.body;
        page.author = self.author.filter(|author| !author.trim().is_empty());
        page.active = self.active;
        if let Some(slug) = self.slug {
            page.slug = slug.trim().to_owned();
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(crate = "rocket::serde")]
pub struct RedirectForm {
    pub old_path: String,
    #[serde(default)]
    pub new_path: String,
}

impl RedirectForm {
    fn validate(&self) -> Result<()> {
        if !self.old_path.starts_with('/') {
            return Err(invalid(format!(
                "{:?} must be an absolute path",
                self.old_path
            )));
        }
        let new_path = self.new_path.trim();
        let target_ok = new_path.is_empty()
            || new_path.starts_with('/')
            || new_path.starts_with("http://")
            || new_path.starts_with("https://");
        if !target_ok {
            return Err(invalid(format!(
                "{:?} must be an absolute path or an http(s) URL",
                new_path
            )));
        }
        Ok(())
    }
}

#[get("/pages")]
pub async fn list_pages(db: PersistDatabase) -> Result<Json<Vec<PageEntry>>> {
    Ok(Json(db.run(|c| PageEntry::all(c)).await?))
}

#[post("/pages", format = "json", data = "<form>")]
pub async fn create_page(
    form: Json<PageForm>,
    config: &State<PagesConfig>,
    db: PersistDatabase,
) -> Result<Created<Json<PageEntry>>> {
    let form = form.into_inner();
    form.validate(config, None)?;

    let entry = db
        .run(move |c| -> Result<PageEntry> {
            form.check_parent_exists(c)?;
            let mut page = Page::new(String::new(), String::new());
            form.apply(&mut page);
            page.save(c)?;
            Ok(page.entry(c)?)
        })
        .await?;

    log::info!("created page {:?} at {}", entry.page.id, entry.absolute_url());
    Ok(Created::new(entry.absolute_url()).body(Json(entry)))
}

#[put("/pages/<id>", format = "json", data = "<form>")]
pub async fn update_page(
    id: i32,
    form: Json<PageForm>,
    config: &State<PagesConfig>,
    db: PersistDatabase,
) -> Result<Json<PageEntry>> {
    let form = form.into_inner();
    form.validate(config, Some(id))?;

    let entry = db
        .run(move |c| -> Result<PageEntry> {
            let mut page = PageEntry::by_id(c, id)?.page;
            form.check_parent_exists(c)?;
            form.apply(&mut page);
            page.save(c)?;
            Ok(page.entry(c)?)
        })
        .await?;

    log::info!("updated page {} at {}", id, entry.absolute_url());
    Ok(Json(entry))
}

#[delete("/pages/<id>")]
pub async fn delete_page(id: i32, db: PersistDatabase) -> Result<NoContent> {
    db.run(move |c| Page::delete(c, id)).await?;
    log::info!("deleted page {}", id);
    Ok(NoContent)
}

#[get("/redirects")]
pub async fn list_redirects(db: PersistDatabase) -> Result<Json<Vec<Redirect>>> {
    Ok(Json(db.run(|c| Redirect::all(c)).await?))
}

#[post("/redirects", format = "json", data = "<form>")]
pub async fn create_redirect(
    form: Json<RedirectForm>,
    db: PersistDatabase,
) -> Result<Created<Json<Redirect>>> {
    let form = form.into_inner();
    form.validate()?;

    let redirect = db
        .run(move |c| {
            let old_path = util::decoded_path(&form.old_path);
            let mut redirect = Redirect::new(old_path, form.new_path.trim());
            redirect.save(c).map(|()| redirect)
        })
        .await?;

    log::info!("added redirect {} -> {}", redirect.old_path, redirect.new_path);
    Ok(Created::new(redirect.old_path.clone()).body(Json(redirect)))
}
