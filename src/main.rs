#[cfg(feature = "ssr")]
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    use actix_web::{middleware, web, App, HttpServer};
    use georeview::api::{configure, cors};
    use georeview::config::{init_tracing, AppConfig};
    use georeview::Database;
    use std::io::{Error, ErrorKind};

    init_tracing();

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| Error::new(ErrorKind::InvalidInput, e))?;

    // Initialize the database
    let db = Database::new(&config.database_path)
        .map_err(|e| Error::new(ErrorKind::Other, e))?;
    db.create_schema()
        .await
        .map_err(|e| Error::new(ErrorKind::Other, e))?;

    let addr = config.bind_addr();
    tracing::info!("listening on http://{}:{}", addr.0, addr.1);

    // Start the Actix Web server
    HttpServer::new(move || {
        App::new()
            .wrap(cors())
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(db.clone()))
            .configure(configure)
    })
    .bind(addr)?
    .run()
    .await
}

#[cfg(not(feature = "ssr"))]
pub fn main() {
    // The HTTP server needs the `ssr` feature; the library and the
    // `populate_db` binary work without it.
}
