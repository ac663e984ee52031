//! Registration, configuration and refresh through the public API.

use std::sync::Arc;
use std::time::Duration;
use serde_json::json;
use declarative_client::client::RequestInterceptor;
use declarative_client::config::loader::{load_manifest, parse_manifest};
use declarative_client::config::watcher::ManifestWatcher;
use declarative_client::context::ConfigurationModule;
use declarative_client::contract::{
    InterfaceMeta, MethodMeta, ParamAnnotation, ParamMeta, PreparedRequest, RequestMapping, TypeDescriptor,
};
use declarative_client::error::ConfigError;
use declarative_client::registrar::{bootstrap, ClientAttributes};
use declarative_client::Manifest;

mod common;
use common::Reply;

#[derive(Debug)]
struct Bearer(&'static str);

impl RequestInterceptor for Bearer {
    fn apply(&self, request: &mut PreparedRequest) {
        request.headers.append("Authorization", format!("Bearer {}", self.0));
    }
}

fn orders_interface() -> InterfaceMeta {
    InterfaceMeta::new("app::OrdersClient").method(
        MethodMeta::new("find")
            .mapping(RequestMapping::get("/orders").produces("application/json"))
            .param(
                ParamMeta::new("status", TypeDescriptor::list_of(TypeDescriptor::String))
                    .annotated(ParamAnnotation::request_param("status")),
            )
            .returns(TypeDescriptor::list_of(TypeDescriptor::Map)),
    )
}

#[tokio::test]
async fn test_code_registered_client_with_scoped_interceptor() {
    let (addr, seen) = common::start_programmable_backend(|_| async { Reply::new(200, r#"[{"id": 1}]"#) }).await;

    let boot = bootstrap(&Manifest::default()).unwrap();
    let attributes = ClientAttributes::named("orders")
        .url(&addr.to_string())
        .configuration(ConfigurationModule::new(|scope| {
            let bearer: Arc<dyn RequestInterceptor> = Arc::new(Bearer("t0k3n"));
            scope.register(bearer);
        }));
    boot.registrar
        .register(&boot.registry, &attributes, &orders_interface())
        .unwrap();

    let client = boot.registry.client_for_type("app::OrdersClient").unwrap();
    let orders = client
        .invoke("find", &[json!(["open", "held"])])
        .await
        .unwrap();
    assert_eq!(orders, json!([{"id": 1}]));

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].target, "/orders?status=open&status=held");
    assert_eq!(seen[0].header("Authorization"), Some("Bearer t0k3n"));
    assert_eq!(seen[0].header("Accept"), Some("application/json"));
    assert!(boot.context.context_names().contains(&"orders".to_string()));
}

#[tokio::test]
async fn test_same_client_instance_per_context_id() {
    let boot = bootstrap(&Manifest::default()).unwrap();
    boot.registrar
        .register(
            &boot.registry,
            &ClientAttributes::named("orders").url("localhost:1"),
            &orders_interface(),
        )
        .unwrap();

    let a = boot.registry.client("orders").unwrap();
    let b = boot.registry.client("ordersClient").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(boot.contracts.len(), 1);
}

#[test]
fn test_invalid_contract_fails_at_build() {
    let boot = bootstrap(&Manifest::default()).unwrap();
    let mut interface = orders_interface();
    interface.request_mapping = Some(RequestMapping::get("/v1"));
    boot.registrar
        .register(&boot.registry, &ClientAttributes::named("orders").url("localhost:1"), &interface)
        .unwrap();

    assert!(matches!(boot.registry.client("orders"), Err(ConfigError::Contract(_))));
}

#[test]
fn test_unknown_component_name_is_reported() {
    let manifest = parse_manifest(
        r#"
        [client.config.orders]
        retryer = "sometimes"
        "#,
    )
    .unwrap();
    let boot = bootstrap(&manifest).unwrap();
    boot.registrar
        .register(
            &boot.registry,
            &ClientAttributes::named("orders").url("localhost:1"),
            &orders_interface(),
        )
        .unwrap();

    assert_eq!(
        boot.registry.client("orders").unwrap_err(),
        ConfigError::UnknownComponent {
            kind: "retryer",
            name: "sometimes".into()
        }
    );
}

const REFRESHABLE: &str = r#"
    [client]
    refresh_enabled = true

    [client.config.orders]
    read_timeout = __READ__

    [[clients]]
    name = "orders"
    url = "localhost:1"

    [clients.interface]
    type_name = "app::OrdersClient"
"#;

#[test]
fn test_refreshed_options_reach_built_client() {
    let path = std::env::temp_dir().join(format!("declarative-client-refresh-{}.toml", std::process::id()));
    std::fs::write(&path, REFRESHABLE.replace("__READ__", "1000")).unwrap();

    let boot = bootstrap(&load_manifest(&path).unwrap()).unwrap();
    let client = boot.registry.client("orders").unwrap();
    assert_eq!(client.config().options.current().read_timeout, Duration::from_millis(1000));

    std::fs::write(&path, REFRESHABLE.replace("__READ__", "2500")).unwrap();
    let (watcher, mut updates) = ManifestWatcher::new(&path, boot.refresh.clone());
    assert_eq!(watcher.reload(), 1);
    assert!(updates.try_recv().is_ok());

    let same = boot.registry.client("orders").unwrap();
    assert!(Arc::ptr_eq(&client, &same));
    assert_eq!(client.config().options.current().read_timeout, Duration::from_millis(2500));

    std::fs::write(&path, "not [valid").unwrap();
    assert_eq!(watcher.reload(), 0);
    assert_eq!(client.config().options.current().read_timeout, Duration::from_millis(2500));

    let _ = std::fs::remove_file(&path);
}
