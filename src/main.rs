extern crate rocket;

use rocket::{
    catchers, fairing::AdHoc, figment::Figment, launch, routes, Build, Rocket,
};
use rocket_dyn_templates::Template;
use rocket_sync_db_pools::{database, diesel};

mod config;
mod error;
mod models;
mod schema;
mod util;
mod views;


use config::PagesConfig;

#[database("persist_database")]
pub struct PersistDatabase(diesel::SqliteConnection);

#[launch]
fn rocket() -> _ {
    dotenvy::dotenv().ok();
    build(rocket::Config::figment())
}

/// Assembles the application from `figment`, which supplies both Rocket's own
/// settings and [`PagesConfig`].
pub fn build(figment: Figment) -> Rocket<Build> {
    rocket::custom(figment)
        .mount("/", routes![views::pages::feed])
        .mount("/", routes![views::pages::short])
        .mount("/", routes![views::pages::page])
        .mount("/", routes![views::pages::nested_page])
        .register("/", catchers![views::redirects::legacy_redirect])
        .attach(Template::fairing())
        .attach(PersistDatabase::fairing())
        .attach(AdHoc::config::<PagesConfig>())
        .attach(AdHoc::try_on_ignite("Create Tables", |rocket| async move {
            let db = PersistDatabase::get_one(&rocket).await;
            let created = match db {
                Some(db) => db.run(schema::create_tables).await,
                None => {
                    log::error!("database pool is unavailable");
                    return Err(rocket);
                }
            };
            match created {
                Ok(()) => Ok(rocket),
                Err(err) => {
                    log::error!("failed to create tables: {}", err);
                    Err(rocket)
                }
            }
        }))
        .attach(AdHoc::on_ignite("Admin API", |rocket| async move {
            let enabled = rocket
                .state::<PagesConfig>()
                .map_or(false, |config| config.admin_api);
            if !enabled {
                return rocket;
            }
            log::warn!("admin API mounted at /admin; it performs no authentication");
            rocket.mount(
                "/admin",
                routes![
                    views::admins::list_pages,
                    views::admins::create_page,
                    views::admins::update_page,
                    views::admins::delete_page,
                    views::admins::list_redirects,
                    views::admins::create_redirect,
                ],
            )
        }))
}
