use crate::{
    config::PagesConfig,
    error::Result,
    models::{PageEntry, PageOrder},
    PersistDatabase,
};
use chrono::NaiveDateTime;
use diesel::QueryResult;
use rocket::{
    get,
    http::{uri::Origin, ContentType},
    response::Redirect,
    serde::Serialize,
    Either, State,
};
use rocket_dyn_templates::{context, Template};

/// Sections whose children are listed newest first rather than by slug.
const CHRONOLOGICAL_SECTIONS: [&str; 2] = ["blog", "press"];

const FEED_LENGTH: i64 = 10;

/// What templates see of a page: the stored fields plus derived values.
#[derive(Serialize, Debug)]
#[serde(crate = "rocket::serde")]
pub struct PageView {
    pub id: Option<i32>,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub author: Option<String>,
    pub active: bool,
    pub teaser: String,
    pub absolute_url: String,
    pub rfc2822_date: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<&PageEntry> for PageView {
    fn from(entry: &PageEntry) -> Self {
        let page = &entry.page;
        PageView {
            id: page.id,
            title: page.title.clone(),
            slug: page.slug.clone(),
            body: page.body.clone(),
            author: page.author.clone(),
            active: page.active,
            teaser: page.teaser().to_owned(),
            absolute_url: entry.absolute_url(),
            rfc2822_date: page.rfc2822_date(),
            created_at: page.created_at,
            updated_at: page.updated_at,
        }
    }
}

/// Permanent redirect to the page's canonical URL.
pub fn local_301(entry: &PageEntry) -> Redirect {
    Redirect::permanent(entry.absolute_url())
}

fn child_order(entry: &PageEntry) -> PageOrder {
    if CHRONOLOGICAL_SECTIONS.contains(&entry.page.slug.as_str()) {
        PageOrder::NewestFirst
    } else {
        PageOrder::Default
    }
}

/// Paginated listings may carry any path, so they are never redirected.
fn is_paginated(origin: &Origin<'_>) -> bool {
    origin
        .query()
        .map_or(false, |query| query.segments().any(|(key, _)| key == "page"))
}

async fn render_page(
    db: PersistDatabase,
    slug: &str,
    origin: &Origin<'_>,
) -> Result<Either<Template, Redirect>> {
    let slug = slug.to_owned();
    let (entry, children) = db
        .run(move |c| -> QueryResult<_> {
            let entry = PageEntry::by_slug(c, &slug)?;
            let children = entry.children(c, child_order(&entry))?;
            Ok((entry, children))
        })
        .await?;

    if origin.to_string() != entry.absolute_url() && !is_paginated(origin) {
        return Ok(Either::Right(local_301(&entry)));
    }

    let children: Vec<PageView> = children.iter().map(PageView::from).collect();
    Ok(Either::Left(Template::render(
        "page",
        context! {
            page: PageView::from(&entry),
            children: children,
            description: entry.page.desc(),
        },
    )))
}

#[get("/<slug>")]
pub async fn page(
    slug: &str,
    origin: &Origin<'_>,
    db: PersistDatabase,
) -> Result<Either<Template, Redirect>> {
    render_page(db, slug, origin).await
}

/// The section segment only matters for the canonical check.
#[get("/<_>/<slug>")]
pub async fn nested_page(
    slug: &str,
    origin: &Origin<'_>,
    db: PersistDatabase,
) -> Result<Either<Template, Redirect>> {
    render_page(db, slug, origin).await
}

/// Short numeric permalink.
#[get("/p/<id>")]
pub async fn short(id: i32, db: PersistDatabase) -> Result<Redirect> {
    let entry = db.run(move |c| PageEntry::by_id(c, id)).await?;
    Ok(local_301(&entry))
}

#[get("/feed")]
pub async fn feed(
    db: PersistDatabase,
    config: &State<PagesConfig>,
) -> Result<(ContentType, Template)> {
    let pages = db
        .run(|c| PageEntry::recently_created(c, FEED_LENGTH))
        .await?;
    let pages: Vec<PageView> = pages.iter().map(PageView::from).collect();

    Ok((
        ContentType::new("application", "rss+xml"),
        Template::render(
            "feed",
            context! {
                pages: pages,
                site_url: &config.site_url,
                site_title: &config.site_title,
            },
        ),
    ))
}
