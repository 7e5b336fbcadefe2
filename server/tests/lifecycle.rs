//! Process-level test main: provision once, run a batch of API cases against
//! the shared store, tear down, and exit with the batch result.
//!
//! Runs against whatever `REGISTRY_TESTDB_URI` names, the in-memory store by
//! default.

use std::panic::{self, AssertUnwindSafe};
use std::process::ExitCode;

use axum::http::{Method, StatusCode};
use resource_registry::api::{CreateResourceProviderInput, UpdateResourceProviderInput};
use resource_registry::config::RegistryConfig;
use resource_registry::entity::RESOURCE_PROVIDER_PREFIX;
use resource_registry::lifecycle::{Environment, Lifecycle};
use resource_registry::provision::StoreProvisioner;
use resource_registry::testing::{
    ResourceProviderBuilder, TENANT_PREFIX, TestServer, graph_test_client, init_tracing,
};
use resource_registry::types::PrefixedId;
use tokio::runtime::Runtime;

struct Context<'a> {
    environment: &'a Environment,
    runtime: Runtime,
}

type Case = fn(&Context<'_>) -> Result<(), String>;

const CASES: &[(&str, Case)] = &[
    ("builder_fills_defaults", builder_fills_defaults),
    ("create_and_fetch", create_and_fetch),
    ("update_refreshes_updated_at", update_refreshes_updated_at),
    ("empty_name_is_rejected", empty_name_is_rejected),
    ("delete_then_not_found", delete_then_not_found),
    ("list_is_scoped_to_tenant", list_is_scoped_to_tenant),
    ("concurrent_creates", concurrent_creates),
    ("in_process_matches_socket", in_process_matches_socket),
];

fn main() -> ExitCode {
    init_tracing();
    let config = match RegistryConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    Lifecycle::new(StoreProvisioner::new(&config)).run(run_batch)
}

fn run_batch(environment: &Environment) -> ExitCode {
    let runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    let cx = Context {
        environment,
        runtime,
    };

    println!("\nrunning {} tests against {}", CASES.len(), environment.dialect());
    let mut failed = Vec::new();
    for (name, case) in CASES {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| case(&cx)))
            .unwrap_or_else(|_| Err("panicked".to_string()));
        match outcome {
            Ok(()) => println!("test {name} ... ok"),
            Err(message) => {
                println!("test {name} ... FAILED\n    {message}");
                failed.push(*name);
            }
        }
    }

    let passed = CASES.len() - failed.len();
    if failed.is_empty() {
        println!("\ntest result: ok. {passed} passed; 0 failed\n");
        ExitCode::SUCCESS
    } else {
        println!(
            "\ntest result: FAILED. {passed} passed; {} failed: {}\n",
            failed.len(),
            failed.join(", ")
        );
        ExitCode::FAILURE
    }
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), String> {
    if condition { Ok(()) } else { Err(message()) }
}

fn builder_fills_defaults(cx: &Context<'_>) -> Result<(), String> {
    let provider = ResourceProviderBuilder::new()
        .create(cx.environment)
        .map_err(|e| e.to_string())?;

    ensure(!provider.name.is_empty(), || "generated name is empty".into())?;
    ensure(!provider.organizational_unit_id.is_empty(), || {
        "generated tenant id is empty".into()
    })?;
    ensure(
        provider.organizational_unit_id.prefix() == TENANT_PREFIX.as_str(),
        || format!("unexpected tenant id {}", provider.organizational_unit_id),
    )?;
    ensure(
        provider.id.prefix() == RESOURCE_PROVIDER_PREFIX.as_str(),
        || format!("unexpected provider id {}", provider.id),
    )
}

fn create_and_fetch(cx: &Context<'_>) -> Result<(), String> {
    let client = graph_test_client(cx.environment);
    cx.runtime.block_on(async {
        let created = client
            .create_resource_provider(&CreateResourceProviderInput {
                name: "compute".to_string(),
                description: Some("virtual machines".to_string()),
                organizational_unit_id: PrefixedId::generate(TENANT_PREFIX),
            })
            .await
            .map_err(|e| e.to_string())?;
        let fetched = client
            .resource_provider(&created.id)
            .await
            .map_err(|e| e.to_string())?;
        ensure(fetched == created, || format!("{fetched:?} != {created:?}"))
    })
}

fn update_refreshes_updated_at(cx: &Context<'_>) -> Result<(), String> {
    let seeded = ResourceProviderBuilder::new()
        .description("before")
        .create(cx.environment)
        .map_err(|e| e.to_string())?;
    let client = graph_test_client(cx.environment);
    cx.runtime.block_on(async {
        let updated = client
            .update_resource_provider(
                &seeded.id,
                &UpdateResourceProviderInput {
                    description: Some("after".to_string()),
                    ..UpdateResourceProviderInput::default()
                },
            )
            .await
            .map_err(|e| e.to_string())?;
        ensure(updated.description.as_deref() == Some("after"), || {
            format!("description not updated: {:?}", updated.description)
        })?;
        ensure(updated.name == seeded.name, || "name changed".into())?;
        ensure(updated.created_at == seeded.created_at, || {
            "created_at changed".into()
        })?;
        ensure(updated.updated_at >= seeded.updated_at, || {
            "updated_at went backwards".into()
        })
    })
}

fn empty_name_is_rejected(cx: &Context<'_>) -> Result<(), String> {
    let client = graph_test_client(cx.environment);
    let tenant = PrefixedId::generate(TENANT_PREFIX);
    cx.runtime.block_on(async {
        let err = client
            .create_resource_provider(&CreateResourceProviderInput {
                name: String::new(),
                description: None,
                organizational_unit_id: tenant.clone(),
            })
            .await
            .err()
            .ok_or("empty name was accepted")?;
        ensure(err.status() == Some(StatusCode::UNPROCESSABLE_ENTITY), || {
            format!("unexpected error: {err}")
        })?;
        let listed = client
            .resource_providers_for_tenant(&tenant)
            .await
            .map_err(|e| e.to_string())?;
        ensure(listed.is_empty(), || "rejected provider was stored".into())
    })
}

fn delete_then_not_found(cx: &Context<'_>) -> Result<(), String> {
    let seeded = ResourceProviderBuilder::new()
        .create(cx.environment)
        .map_err(|e| e.to_string())?;
    let client = graph_test_client(cx.environment);
    cx.runtime.block_on(async {
        client
            .delete_resource_provider(&seeded.id)
            .await
            .map_err(|e| e.to_string())?;
        let err = client
            .resource_provider(&seeded.id)
            .await
            .err()
            .ok_or("deleted provider still readable")?;
        ensure(err.status() == Some(StatusCode::NOT_FOUND), || {
            format!("unexpected error: {err}")
        })
    })
}

fn list_is_scoped_to_tenant(cx: &Context<'_>) -> Result<(), String> {
    let tenant = PrefixedId::generate(TENANT_PREFIX);
    let mut expected = Vec::new();
    for _ in 0..3 {
        expected.push(
            ResourceProviderBuilder::new()
                .organizational_unit_id(tenant.clone())
                .create(cx.environment)
                .map_err(|e| e.to_string())?,
        );
    }
    ResourceProviderBuilder::new()
        .create(cx.environment)
        .map_err(|e| e.to_string())?;

    let mut listed = cx
        .environment
        .store()
        .resource_providers_for_tenant(&tenant)
        .map_err(|e| e.to_string())?;
    listed.sort_by(|a, b| a.id.cmp(&b.id));
    expected.sort_by(|a, b| a.id.cmp(&b.id));
    ensure(listed == expected, || {
        format!("listed {} providers, expected {}", listed.len(), expected.len())
    })
}

fn concurrent_creates(cx: &Context<'_>) -> Result<(), String> {
    const WRITERS: usize = 16;
    let tenant = PrefixedId::generate(TENANT_PREFIX);
    cx.runtime.block_on(async {
        let mut tasks = Vec::with_capacity(WRITERS);
        for i in 0..WRITERS {
            let client = graph_test_client(cx.environment);
            let input = CreateResourceProviderInput {
                name: format!("writer {i}"),
                description: None,
                organizational_unit_id: tenant.clone(),
            };
            tasks.push(tokio::spawn(async move {
                client.create_resource_provider(&input).await
            }));
        }
        for task in tasks {
            task.await
                .map_err(|e| e.to_string())?
                .map_err(|e| e.to_string())?;
        }

        let listed = graph_test_client(cx.environment)
            .resource_providers_for_tenant(&tenant)
            .await
            .map_err(|e| e.to_string())?;
        ensure(listed.len() == WRITERS, || {
            format!("expected {WRITERS} providers, found {}", listed.len())
        })
    })
}

fn in_process_matches_socket(cx: &Context<'_>) -> Result<(), String> {
    cx.runtime.block_on(async {
        let server = TestServer::for_environment(cx.environment)
            .await
            .map_err(|e| e.to_string())?;
        let in_process = graph_test_client(cx.environment)
            .send(Method::GET, "/healthz", None)
            .await
            .map_err(|e| e.to_string())?;
        let over_socket = server
            .client()
            .send(Method::GET, "/healthz", None)
            .await
            .map_err(|e| e.to_string())?;

        ensure(in_process.status() == StatusCode::OK, || {
            format!("status {}", in_process.status())
        })?;
        ensure(in_process.status() == over_socket.status(), || {
            format!("{} != {}", in_process.status(), over_socket.status())
        })?;
        ensure(in_process.body() == over_socket.body(), || {
            format!("{:?} != {:?}", in_process.body(), over_socket.body())
        })?;
        ensure(in_process.body().as_ref() == br#"{"ok":true}"#, || {
            format!("unexpected body {:?}", in_process.body())
        })
    })
}
