use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use catalog::Catalog;
use field_sync::{InMemoryForm, SelectOption, SyncEvent, SyncSettings, Synchronizer};
use shared::protocol::{subcategory_listing_path, SubcategoryQuery};
use tokio::{net::TcpListener, sync::broadcast};

async fn list(
    State(catalog): State<Arc<Catalog>>,
    Query(query): Query<SubcategoryQuery>,
) -> impl IntoResponse {
    match catalog.list_subcategories(query.category_id.as_deref()) {
        Ok(records) => Json(records).into_response(),
        Err(err) => (StatusCode::BAD_REQUEST, err.message).into_response(),
    }
}

async fn spawn_catalog_server() -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new()
        .route(&subcategory_listing_path("dds"), get(list))
        .with_state(Arc::new(Catalog::sample()));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

async fn next_settled(events: &mut broadcast::Receiver<SyncEvent>) -> SyncEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await.expect("events") {
                event @ (SyncEvent::Applied { .. }
                | SyncEvent::Cleared { .. }
                | SyncEvent::FetchFailed { .. }) => return event,
                _ => continue,
            }
        }
    })
    .await
    .expect("settled")
}

fn labels(form: &InMemoryForm) -> Vec<String> {
    form.options("id_subcategory")
        .expect("subcategory control")
        .into_iter()
        .map(|option| option.label)
        .collect()
}

#[tokio::test]
async fn admin_form_follows_category_selection_acceptance() {
    let base_url = spawn_catalog_server().await;
    let form = Arc::new(InMemoryForm::new());
    let settings = SyncSettings {
        base_url,
        bind_retry_interval: Duration::from_millis(10),
        ..SyncSettings::default()
    };
    let sync = Synchronizer::over_http(form.clone(), settings).expect("synchronizer");
    let mut events = sync.subscribe_events();

    let binding = tokio::spawn({
        let sync = sync.clone();
        async move { sync.bind().await }
    });

    // Controls show up after the synchronizer started waiting, with a
    // category preselected as on an edit page.
    tokio::time::sleep(Duration::from_millis(30)).await;
    form.insert_select(
        "id_category",
        vec![
            SelectOption::sentinel("---------"),
            SelectOption::new("1", "Infrastructure"),
            SelectOption::new("2", "Marketing"),
        ],
        "1",
    );
    form.insert_select("id_subcategory", vec![SelectOption::sentinel("---------")], "");

    let binding = binding.await.expect("join").expect("bound");

    assert!(matches!(
        next_settled(&mut events).await,
        SyncEvent::Applied { options: 2, .. }
    ));
    assert_eq!(labels(&form), vec!["---------", "VPS", "Proxy"]);

    form.select("id_category", "2").expect("select marketing");
    next_settled(&mut events).await;
    assert_eq!(labels(&form), vec!["---------", "Farpost", "Avito"]);

    form.select("id_category", "99").expect("select unknown");
    assert!(matches!(
        next_settled(&mut events).await,
        SyncEvent::Applied { options: 0, .. }
    ));
    assert_eq!(labels(&form), vec!["---------"]);

    form.select("id_category", "not-a-number").expect("select garbage");
    assert!(matches!(
        next_settled(&mut events).await,
        SyncEvent::FetchFailed { .. }
    ));
    assert_eq!(labels(&form), vec!["---------"]);

    form.select("id_category", "").expect("clear");
    assert!(matches!(
        next_settled(&mut events).await,
        SyncEvent::Cleared { .. }
    ));

    binding.detach();
}
