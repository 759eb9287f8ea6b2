use std::collections::BTreeMap;
use std::sync::{Mutex, Once};

use actix_web::{App, HttpResponse, test, web};
use actix_web_middleware_clf::AccessLogger;
use log::kv::Source;

#[derive(Debug, Clone)]
struct Logged {
    level: log::Level,
    target: String,
    message: String,
    kvs: BTreeMap<String, String>,
}

struct CaptureLogger {
    records: Mutex<Vec<Logged>>,
}

struct Collect<'a>(&'a mut BTreeMap<String, String>);

impl<'kvs> log::kv::VisitSource<'kvs> for Collect<'_> {
    fn visit_pair(
        &mut self,
        key: log::kv::Key<'kvs>,
        value: log::kv::Value<'kvs>,
    ) -> Result<(), log::kv::Error> {
        self.0.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl log::Log for CaptureLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if !record.target().starts_with("access") {
            return;
        }
        let mut kvs = BTreeMap::new();
        record
            .key_values()
            .visit(&mut Collect(&mut kvs))
            .unwrap();
        self.records.lock().unwrap().push(Logged {
            level: record.level(),
            target: record.target().to_string(),
            message: record.args().to_string(),
            kvs,
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger {
    records: Mutex::new(Vec::new()),
};
static INIT: Once = Once::new();

fn take_records(target: &str) -> Vec<Logged> {
    INIT.call_once(|| {
        log::set_logger(&LOGGER).unwrap();
        log::set_max_level(log::LevelFilter::Trace);
    });
    let mut records = LOGGER.records.lock().unwrap();
    let (mine, rest): (Vec<_>, Vec<_>) = records.drain(..).partition(|r| r.target == target);
    *records = rest;
    mine
}

#[actix_web::test]
async fn levels_and_fields_reach_log_facade() {
    take_records("access.levels");

    let app = test::init_service(
        App::new()
            .wrap(AccessLogger::default().log_target("access.levels"))
            .route(
                "/users",
                web::get().to(|| async { HttpResponse::Ok().body(vec![b'x'; 42]) }),
            )
            .route(
                "/login",
                web::post().to(|| async { HttpResponse::Unauthorized().finish() }),
            )
            .route(
                "/crash",
                web::get().to(|| async { HttpResponse::ServiceUnavailable().finish() }),
            ),
    )
    .await;

    let requests = [
        test::TestRequest::get()
            .uri("/users?id=5")
            .peer_addr("192.0.2.10:41000".parse().unwrap())
            .to_request(),
        test::TestRequest::post().uri("/login").to_request(),
        test::TestRequest::get()
            .uri("/crash")
            .insert_header(("user-agent", "probe/1.0"))
            .to_request(),
    ];
    for req in requests {
        let res = test::call_service(&app, req).await;
        test::read_body(res).await;
    }

    let records = take_records("access.levels");
    assert_eq!(records.len(), 3);

    let ok = &records[0];
    assert_eq!(ok.level, log::Level::Info);
    assert_eq!(ok.kvs["statusCode"], "200");
    assert_eq!(ok.kvs["path"], "/users?id=5");
    assert_eq!(ok.kvs["dataLength"], "42");
    assert_eq!(ok.kvs["userAgent"], "-");
    assert_eq!(ok.kvs["referer"], "-");
    assert_eq!(ok.kvs["clientIP"], "192.0.2.10:41000");
    assert_eq!(ok.kvs["method"], "GET");
    assert_eq!(ok.kvs["proto"], "HTTP/1.1");
    assert!(ok.kvs["duration"].parse::<u64>().is_ok());
    assert!(ok.message.starts_with("192.0.2.10:41000 - - ["));
    assert!(ok.message.contains("\"GET /users?id=5 HTTP/1.1\" 200 42 \"-\" \"-\" "));
    assert!(ok.message.ends_with(ok.kvs["durationPretty"].as_str()));
    assert_eq!(ok.kvs.len(), 10);

    assert_eq!(records[1].level, log::Level::Warn);
    assert_eq!(records[1].kvs["statusCode"], "401");
    assert_eq!(records[1].kvs["clientIP"], "-");

    assert_eq!(records[2].level, log::Level::Error);
    assert_eq!(records[2].kvs["statusCode"], "503");
    assert_eq!(records[2].kvs["userAgent"], "probe/1.0");
}

#[actix_web::test]
async fn excluded_paths_stay_silent() {
    take_records("access.excluded");

    let app = test::init_service(
        App::new()
            .wrap(
                AccessLogger::default()
                    .log_target("access.excluded")
                    .exclude("/health"),
            )
            .default_service(web::to(|| async { HttpResponse::Ok().finish() })),
    )
    .await;

    for uri in ["/health", "/health?verbose=1", "/ready"] {
        let res = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        test::read_body(res).await;
    }

    let records = take_records("access.excluded");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kvs["path"], "/ready");
}
