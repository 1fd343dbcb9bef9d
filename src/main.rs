//! Console host demo.
//!
//! # Architecture Overview
//!
//! ```text
//!   appsettings.toml ──┐
//!   appsettings.{Env} ─┼─▶ config ──▶ HostBuilder ──▶ Host::run_console()
//!   HOST_ENVIRONMENT ──┘                  │
//!                                         ▼
//!                             use_startup(StartupType)
//!                                         │
//!             ┌───────────────────────────┼──────────────────────────┐
//!             ▼                           ▼                          ▼
//!      ConfigureServices          ConfigureContainer            Configure{Env}
//!      (services filters)         (container filters)           (startup filters,
//!                                                                scoped params)
//! ```

use std::path::PathBuf;

use clap::Parser;

use startup_host::hosting::{ApplicationBuilder, Host, HostEnvironment};
use startup_host::services::ServiceCollection;
use startup_host::startup::{ConfigureAction, MethodInfo, Returned, StartupType};

#[derive(Parser)]
#[command(name = "startup-host")]
#[command(about = "Runs a console host with a convention-based startup", long_about = None)]
struct Cli {
    /// Environment name (overrides configuration and HOST_ENVIRONMENT)
    #[arg(short, long)]
    environment: Option<String>,

    /// Directory containing appsettings*.toml
    #[arg(short, long, default_value = ".")]
    config_dir: PathBuf,
}

/// Service registered by the demo startup.
struct Greeter {
    greeting: String,
}

#[derive(Default)]
struct DemoStartup;

fn demo_startup() -> StartupType {
    StartupType::with_default::<DemoStartup>("DemoStartup")
        .method(MethodInfo::configure_services::<DemoStartup, _>(
            "ConfigureServices",
            |_, services| {
                services.add_singleton_factory(|provider| {
                    let env = provider.get_required::<HostEnvironment>()?;
                    Ok(Greeter {
                        greeting: format!("Hello from {}", env.application_name()),
                    })
                });
                Ok(())
            },
        ))
        .method(
            MethodInfo::instance::<DemoStartup>("Configure")
                .param::<ApplicationBuilder>("app")
                .param::<Greeter>("greeter")
                .invoke_on(|_: &DemoStartup, args| {
                    let greeter = args.service::<Greeter>(1)?;
                    let app = args.get_mut::<ApplicationBuilder>(0)?;
                    tracing::info!(environment = app.environment().environment_name(), "{}", greeter.greeting);
                    app.set_property("greeting", greeter.greeting.clone());
                    Ok(Returned::Unit)
                }),
        )
        .method(MethodInfo::configure::<DemoStartup, _>("ConfigureDevelopment", |_, app| {
            tracing::info!(environment = app.environment().environment_name(), "Development configuration applied");
            app.set_property("diagnostics", "verbose");
            Ok(())
        }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut builder = Host::create_default_builder_in(&cli.config_dir)?;
    if let Some(environment) = cli.environment {
        builder = builder.use_environment(environment);
    }

    let host = builder
        .configure_services(|ctx, services: &mut ServiceCollection| {
            let environment = ctx.environment().environment_name().to_string();
            services.add_startup_filter(move |next: ConfigureAction| -> ConfigureAction {
                let environment = environment.clone();
                Box::new(move |app: &mut ApplicationBuilder| {
                    tracing::debug!(environment = %environment, "Configuring application");
                    next(app)
                })
            });
        })
        .use_startup(demo_startup())
        .build()?;

    tracing::info!(instance_id = %host.instance_id(), "startup-host starting");
    host.run_console().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
