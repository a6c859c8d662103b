use crate::schema::{pages, redirects};
use crate::util;
use chrono::{NaiveDateTime, Utc};
use diesel::{
    prelude::*,
    result::Error as DieselError,
    sql_query,
    sql_types::{BigInt, Integer, Nullable, Text},
    sqlite::SqliteConnection,
};
use serde::Serialize;

/// Every page read carries its parent's slug so the canonical URL can be
/// built without a second lookup.
const ENTRY_QUERY: &str = r#"
    SELECT page.*, parent.slug AS parent_slug
    FROM pages AS page
    LEFT JOIN pages AS parent ON page.parent_id = parent.id
"#;

const DEFAULT_ORDER: &str = "ORDER BY parent.slug, page.slug";
const NEWEST_FIRST: &str = "ORDER BY page.created_at DESC, page.id DESC";

/// How a list of pages is sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOrder {
    /// Parent slug, then slug.
    Default,
    /// Creation time, most recent first.
    NewestFirst,
}

impl PageOrder {
    fn clause(self) -> &'static str {
        match self {
            PageOrder::Default => DEFAULT_ORDER,
            PageOrder::NewestFirst => NEWEST_FIRST,
        }
    }
}

fn last_insert_id(connection: &mut SqliteConnection) -> QueryResult<i32> {
    let row_id = diesel::select(diesel::dsl::sql::<BigInt>("last_insert_rowid()"))
        .get_result::<i64>(connection)?;
    i32::try_from(row_id).map_err(|err| DieselError::DeserializationError(Box::new(err)))
}

/// Editable page: help article, blog post, press item or a section holding them.
#[derive(
    Queryable, QueryableByName, Insertable, AsChangeset, Serialize, Debug, Clone, PartialEq,
)]
#[diesel(primary_key(id))]
#[diesel(table_name = pages)]
#[diesel(treat_none_as_null = true)]
pub struct Page {
    pub id: Option<i32>,
    pub parent_id: Option<i32>,
    pub title: String,
    pub body: String,
    pub author: Option<String>,
    pub slug: String,
    pub active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Page {
    /// An unsaved, inactive top-level page. The slug is filled in by [`Page::save`].
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        let now = Utc::now().naive_utc();
        Page {
            id: None,
            parent_id: None,
            title: title.into(),
            body: body.into(),
            author: None,
            slug: String::new(),
            active: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Inserts or updates the whole row.
    ///
    /// A blank slug is derived from the title; an existing one is kept even
    /// when the title changes. `updated_at` is always stamped. A page whose
    /// title has no letters or digits needs an explicit slug.
    pub fn save(&mut self, connection: &mut SqliteConnection) -> QueryResult<()> {
        if self.slug.trim().is_empty() {
            self.slug = util::slug_for(&self.title);
        }
        if self.slug.is_empty() {
            return Err(DieselError::QueryBuilderError(
                format!("no slug can be derived from title {:?}", self.title).into(),
            ));
        }
        self.updated_at = Utc::now().naive_utc();

        match self.id {
            Some(page_id) => {
                diesel::update(pages::table.filter(pages::id.eq(page_id)))
                    .set(&*self)
                    .execute(connection)?;
            }
            None => {
                let page_id = connection.transaction(|c| {
                    diesel::insert_into(pages::table).values(&*self).execute(c)?;
                    last_insert_id(c)
                })?;
                self.id = Some(page_id);
            }
        }
        Ok(())
    }

    /// Removes a page. Its children become top-level pages.
    pub fn delete(connection: &mut SqliteConnection, page_id: i32) -> QueryResult<()> {
        connection.transaction(|c| {
            diesel::update(pages::table.filter(pages::parent_id.eq(page_id)))
                .set(pages::parent_id.eq(None::<i32>))
                .execute(c)?;
            let deleted = diesel::delete(pages::table.filter(pages::id.eq(page_id))).execute(c)?;
            if deleted == 0 {
                return Err(DieselError::NotFound);
            }
            Ok(())
        })
    }

    /// Re-reads a saved page together with its parent's slug.
    pub fn entry(&self, connection: &mut SqliteConnection) -> QueryResult<PageEntry> {
        match self.id {
            Some(page_id) => PageEntry::by_id(connection, page_id),
            None => Err(DieselError::NotFound),
        }
    }

    pub fn teaser(&self) -> &str {
        util::teaser(&self.body)
    }

    pub fn desc(&self) -> String {
        util::meta_desc(&self.body, &self.title)
    }

    pub fn rfc2822_date(&self) -> String {
        util::rfc2822(&self.created_at)
    }
}

/// A stored page along with the slug of its parent, if it has one.
#[derive(QueryableByName, Serialize, Debug, Clone, PartialEq)]
pub struct PageEntry {
    #[diesel(embed)]
    #[serde(flatten)]
    pub page: Page,
    #[diesel(sql_type = Nullable<Text>)]
    pub parent_slug: Option<String>,
}

impl PageEntry {
    /// Lowest id wins when several pages share the slug.
    pub fn by_slug(connection: &mut SqliteConnection, slug: &str) -> QueryResult<PageEntry> {
        sql_query(format!("{} WHERE page.slug = ? ORDER BY page.id LIMIT 1", ENTRY_QUERY))
            .bind::<Text, _>(slug)
            .get_result(connection)
    }

    pub fn by_id(connection: &mut SqliteConnection, page_id: i32) -> QueryResult<PageEntry> {
        sql_query(format!("{} WHERE page.id = ?", ENTRY_QUERY))
            .bind::<Integer, _>(page_id)
            .get_result(connection)
    }

    pub fn all(connection: &mut SqliteConnection) -> QueryResult<Vec<PageEntry>> {
        sql_query(format!("{} {}", ENTRY_QUERY, DEFAULT_ORDER)).load(connection)
    }

    pub fn recently_created(
        connection: &mut SqliteConnection,
        limit: i64,
    ) -> QueryResult<Vec<PageEntry>> {
        sql_query(format!("{} {} LIMIT ?", ENTRY_QUERY, NEWEST_FIRST))
            .bind::<BigInt, _>(limit)
            .load(connection)
    }

    pub fn children(
        &self,
        connection: &mut SqliteConnection,
        order: PageOrder,
    ) -> QueryResult<Vec<PageEntry>> {
        sql_query(format!(
            "{} WHERE page.parent_id = ? {}",
            ENTRY_QUERY,
            order.clause()
        ))
        .bind::<Nullable<Integer>, _>(self.page.id)
        .load(connection)
    }

    pub fn absolute_url(&self) -> String {
        util::absolute_url(self.parent_slug.as_deref(), &self.page.slug)
    }
}

/// Permanent redirect from a legacy URL to its new counterpart.
#[derive(Queryable, Insertable, AsChangeset, Serialize, Debug, Clone, PartialEq)]
#[diesel(primary_key(id))]
#[diesel(table_name = redirects)]
pub struct Redirect {
    pub id: Option<i32>,
    /// Absolute path without the domain, e.g. `/some/path`.
    pub old_path: String,
    /// Absolute path or full `http(s)://` URL. Blank means the page is gone.
    pub new_path: String,
    pub usage_count: i32,
    pub last_used: NaiveDateTime,
}

impl Redirect {
    pub fn new(old_path: impl Into<String>, new_path: impl Into<String>) -> Self {
        Redirect {
            id: None,
            old_path: old_path.into(),
            new_path: new_path.into(),
            usage_count: 0,
            last_used: Utc::now().naive_utc(),
        }
    }

    pub fn by_old_path(connection: &mut SqliteConnection, old_path: &str) -> QueryResult<Redirect> {
        redirects::table
            .filter(redirects::old_path.eq(old_path))
            .first(connection)
    }

    pub fn all(connection: &mut SqliteConnection) -> QueryResult<Vec<Redirect>> {
        redirects::table
            .order(redirects::old_path.asc())
            .load(connection)
    }

    pub fn save(&mut self, connection: &mut SqliteConnection) -> QueryResult<()> {
        match self.id {
            Some(redirect_id) => {
                diesel::update(redirects::table.filter(redirects::id.eq(redirect_id)))
                    .set(&*self)
                    .execute(connection)?;
            }
            None => {
                let redirect_id = connection.transaction(|c| {
                    diesel::insert_into(redirects::table)
                        .values(&*self)
                        .execute(c)?;
                    last_insert_id(c)
                })?;
                self.id = Some(redirect_id);
            }
        }
        Ok(())
    }

    /// Looks up the redirect for `old_path` and records the traversal.
    pub fn follow(
        connection: &mut SqliteConnection,
        old_path: &str,
    ) -> QueryResult<Option<Redirect>> {
        connection.transaction(|c| {
            let updated = diesel::update(redirects::table.filter(redirects::old_path.eq(old_path)))
                .set((
                    redirects::usage_count.eq(redirects::usage_count + 1),
                    redirects::last_used.eq(Utc::now().naive_utc()),
                ))
                .execute(c)?;
            if updated == 0 {
                return Ok(None);
            }
            Redirect::by_old_path(c, old_path).map(Some)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn connection() -> SqliteConnection {
        let mut connection = SqliteConnection::establish(":memory:").unwrap();
        crate::schema::create_tables(&mut connection).unwrap();
        connection
    }

    fn day(n: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, n)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn saved(c: &mut SqliteConnection, title: &str, parent_id: Option<i32>, created: u32) -> Page {
        let mut page = Page::new(title, "<p>body</p>");
        page.parent_id = parent_id;
        page.created_at = day(created);
        page.save(c).unwrap();
        page
    }

    #[test]
    fn save_derives_slug_and_assigns_id() {
        let c = &mut connection();
        let mut page = Page::new("Getting Started: The Basics", "text");
        page.save(c).unwrap();

        assert!(page.id.is_some());
        assert_eq!(page.slug, "getting-started-the-basics");
        let stored = PageEntry::by_slug(c, "getting-started-the-basics").unwrap();
        assert_eq!(stored.page.id, page.id);
        assert_eq!(stored.parent_slug, None);
        assert_eq!(stored.absolute_url(), "/getting-started-the-basics");
    }

    #[test]
    fn save_keeps_existing_slug_and_refreshes_updated_at() {
        let c = &mut connection();
        let mut page = Page::new("Original", "text");
        page.save(c).unwrap();
        let first_update = page.updated_at;

        page.title = "Renamed".to_owned();
        page.updated_at = first_update - Duration::days(1);
        page.save(c).unwrap();

        let stored = PageEntry::by_id(c, page.id.unwrap()).unwrap().page;
        assert_eq!(stored.slug, "original");
        assert_eq!(stored.title, "Renamed");
        assert!(stored.updated_at >= first_update);
    }

    #[test]
    fn save_refuses_title_without_slug_material() {
        let c = &mut connection();
        let mut page = Page::new("???", "body");
        assert!(matches!(page.save(c), Err(DieselError::QueryBuilderError(_))));
        assert_eq!(page.id, None);
        assert!(PageEntry::all(c).unwrap().is_empty());

        page.slug = "questions".to_owned();
        page.save(c).unwrap();
        assert_eq!(page.entry(c).unwrap().absolute_url(), "/questions");
    }

    #[test]
    fn explicit_slug_is_kept() {
        let c = &mut connection();
        let mut page = Page::new("Frequently Asked Questions", "text");
        page.slug = "faq".to_owned();
        page.save(c).unwrap();
        assert!(PageEntry::by_slug(c, "faq").is_ok());
    }

    #[test]
    fn missing_lookups_are_not_found() {
        let c = &mut connection();
        assert_eq!(PageEntry::by_slug(c, "nope"), Err(DieselError::NotFound));
        assert_eq!(PageEntry::by_id(c, 42), Err(DieselError::NotFound));
        assert_eq!(
            Redirect::by_old_path(c, "/nope"),
            Err(DieselError::NotFound)
        );
    }

    #[test]
    fn children_carry_parent_slug_and_honour_order() {
        let c = &mut connection();
        let blog = saved(c, "Blog", None, 1);
        saved(c, "Bravo", blog.id, 3);
        saved(c, "Alpha", blog.id, 2);
        saved(c, "Charlie", blog.id, 4);
        saved(c, "Unrelated", None, 5);

        let blog = PageEntry::by_slug(c, "blog").unwrap();
        let by_slug: Vec<String> = blog
            .children(c, PageOrder::Default)
            .unwrap()
            .into_iter()
            .map(|child| child.absolute_url())
            .collect();
        assert_eq!(by_slug, ["/blog/alpha", "/blog/bravo", "/blog/charlie"]);

        let newest: Vec<String> = blog
            .children(c, PageOrder::NewestFirst)
            .unwrap()
            .into_iter()
            .map(|child| child.page.slug)
            .collect();
        assert_eq!(newest, ["charlie", "bravo", "alpha"]);
    }

    #[test]
    fn all_sorts_by_parent_slug_then_slug() {
        let c = &mut connection();
        let press = saved(c, "Press", None, 1);
        let help = saved(c, "Help", None, 1);
        saved(c, "Zulu", help.id, 1);
        saved(c, "Alpha", press.id, 1);

        let urls: Vec<String> = PageEntry::all(c)
            .unwrap()
            .iter()
            .map(PageEntry::absolute_url)
            .collect();
        assert_eq!(urls, ["/help", "/press", "/help/zulu", "/press/alpha"]);
    }

    #[test]
    fn recently_created_is_bounded_and_newest_first() {
        let c = &mut connection();
        for n in 1..=12 {
            saved(c, &format!("Post {}", n), None, n);
        }
        let recent = PageEntry::recently_created(c, 10).unwrap();
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].page.slug, "post-12");
        assert_eq!(recent[9].page.slug, "post-3");
    }

    #[test]
    fn delete_orphans_children() {
        let c = &mut connection();
        let help = saved(c, "Help", None, 1);
        let child = saved(c, "Billing", help.id, 2);

        Page::delete(c, help.id.unwrap()).unwrap();

        let child = PageEntry::by_id(c, child.id.unwrap()).unwrap();
        assert_eq!(child.page.parent_id, None);
        assert_eq!(child.absolute_url(), "/billing");
        assert_eq!(Page::delete(c, help.id.unwrap()), Err(DieselError::NotFound));
    }

    #[test]
    fn derived_values() {
        let mut page = Page::new("News", "<p>Lead</p><hr><p>More</p>");
        page.created_at = day(14);
        assert_eq!(page.teaser(), "<p>Lead</p>");
        assert_eq!(page.desc(), "Lead More");
        assert_eq!(page.rfc2822_date(), "Tue, 14 Jan 2020 12:00:00 +0000");
    }

    #[test]
    fn redirect_old_path_is_unique() {
        let c = &mut connection();
        Redirect::new("/old", "/new").save(c).unwrap();
        let err = Redirect::new("/old", "/other").save(c).unwrap_err();
        assert!(matches!(
            err,
            DieselError::DatabaseError(diesel::result::DatabaseErrorKind::UniqueViolation, _)
        ));
    }

    #[test]
    fn follow_records_usage() {
        let c = &mut connection();
        let mut redirect = Redirect::new("/legacy", "/help");
        redirect.last_used = day(1);
        redirect.save(c).unwrap();

        let followed = Redirect::follow(c, "/legacy").unwrap().unwrap();
        assert_eq!(followed.usage_count, 1);
        assert!(followed.last_used > day(1));
        let followed = Redirect::follow(c, "/legacy").unwrap().unwrap();
        assert_eq!(followed.usage_count, 2);

        assert_eq!(Redirect::follow(c, "/unknown").unwrap(), None);
    }

    #[test]
    fn redirects_list_by_old_path() {
        let c = &mut connection();
        Redirect::new("/b", "/x").save(c).unwrap();
        Redirect::new("/a", "/y").save(c).unwrap();
        let paths: Vec<String> = Redirect::all(c)
            .unwrap()
            .into_iter()
            .map(|r| r.old_path)
            .collect();
        assert_eq!(paths, ["/a", "/b"]);
    }
}
