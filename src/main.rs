use anyhow::Context;
use clap::Parser;
use parcel_label::domain::model::{CarrierMethodDraft, LabelArtifact};
use parcel_label::domain::ports::{AttachmentStore, CatalogCache, ConfigProvider};
use parcel_label::utils::error::{ErrorSeverity, PipelineError};
use parcel_label::utils::{logger, validation::Validate};
use parcel_label::{CliConfig, Command, LabelService, LocalDirectory, TomlConfig, WebserviceClient};
use std::time::Duration;

type Service = LabelService<WebserviceClient, TomlConfig, LocalDirectory>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let mut config = TomlConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load configuration from '{}'", cli.config))?;
    if let Some(codec) = cli.codec {
        config = config.with_codec(codec);
    }

    if cli.json_logs || config.json_logs() {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting parcel-label CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
        tracing::debug!("Webservice config: {:?}", config.webservice);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    let client = WebserviceClient::new(config.codec().codec())
        .with_limits(config.decode_limits())
        .with_auth_fault_codes(config.auth_fault_codes());
    let directory = LocalDirectory::new(config.data_dir());
    let service = LabelService::new(client, config.clone(), directory.clone());
    tracing::debug!("Using codec {} against {}", config.codec(), config.endpoint());

    restore_catalog(&service, &directory).await;

    match cli.command {
        Command::RefreshCatalog => refresh_catalog(&service, &directory).await,
        Command::Options { service: code } => {
            warn_if_catalog_empty(&service);
            let options = service.filter_options(&code);
            if options.is_empty() {
                println!("No options available for service '{}'", code);
            }
            for option in options {
                println!("{}\t{:?}\t{}", option.code, option.kind, option.name);
            }
            Ok(())
        }
        Command::Validate {
            service: code,
            options,
        } => {
            warn_if_catalog_empty(&service);
            match service.validate_carrier_method(&code, &options) {
                Ok(selection) => {
                    println!(
                        "✅ Service {} accepts options {:?}",
                        selection.service_code(),
                        selection.option_codes()
                    );
                    Ok(())
                }
                Err(e) => {
                    tracing::error!("❌ {}", e);
                    eprintln!("❌ {} (fix '{}')", e, e.offending_identifier());
                    std::process::exit(1);
                }
            }
        }
        Command::ConfigureMethod {
            id,
            group,
            service: code,
            options,
            instructions,
        } => {
            let method = service
                .configure_carrier_method(CarrierMethodDraft {
                    id,
                    service_group: group,
                    service: code,
                    options,
                    instructions,
                })
                .await?;
            println!(
                "✅ Carrier method '{}' saved: {} {:?}",
                method.id(),
                method.service(),
                method.options()
            );
            Ok(())
        }
        Command::AvailableMethods {
            shipment,
            preferred,
        } => {
            let methods = service.available_methods(&shipment).await?;
            for method in &methods {
                println!("{}\t{}\t{:?}", method.id(), method.service(), method.options());
            }
            if let Some(preferred) = preferred {
                match service
                    .preferred_method(&shipment, Some(&preferred), None)
                    .await?
                {
                    Some(method) => println!("Preferred: {}", method.id()),
                    None => println!("Preferred method '{}' is not available", preferred),
                }
            }
            Ok(())
        }
        Command::GenerateLabel {
            shipment,
            method,
            retries,
            retry_delay_ms,
        } => {
            let retry_delay = Duration::from_millis(retry_delay_ms);
            match generate_with_retries(&service, &shipment, &method, retries, retry_delay).await {
                Ok(artifact) => {
                    let location = directory
                        .attach(&shipment, &artifact)
                        .await
                        .context("Label generated but could not be attached")?;
                    tracing::info!("✅ Label attached to shipment '{}'", shipment);
                    println!("✅ Tracking number: {}", artifact.tracking_number);
                    println!("📁 Label saved to: {}", location);
                    Ok(())
                }
                Err(e) => exit_with(e),
            }
        }
    }
}

async fn restore_catalog(service: &Service, directory: &LocalDirectory) {
    match directory.load_catalog().await {
        Ok(Some(snapshot)) => {
            if let Err(e) = service.catalog().restore(snapshot) {
                tracing::warn!("Cached catalog ignored: {}", e);
            }
        }
        Ok(None) => tracing::debug!("No cached catalog"),
        Err(e) => tracing::warn!("Cached catalog unreadable: {}", e),
    }
}

async fn refresh_catalog(service: &Service, directory: &LocalDirectory) -> anyhow::Result<()> {
    let snapshot = service.refresh_catalog().await?;
    directory
        .store_catalog(&snapshot)
        .await
        .context("Catalog refreshed but could not be cached")?;
    println!(
        "✅ Catalog revision {}: {} active services",
        snapshot.revision,
        snapshot.active_services().count()
    );
    Ok(())
}

fn warn_if_catalog_empty(service: &Service) {
    if service.snapshot().is_empty() {
        tracing::warn!("⚠️ No catalog loaded, run 'refresh-catalog' first");
    }
}

/// Retries only failures the error marks as retryable, doubling the delay
/// after each attempt.
async fn generate_with_retries(
    service: &Service,
    shipment: &str,
    method: &str,
    retries: u32,
    retry_delay: Duration,
) -> Result<LabelArtifact, PipelineError> {
    let mut attempt = 0;
    loop {
        match service.generate_label(shipment, method).await {
            Ok(artifact) => return Ok(artifact),
            Err(e) if e.is_retryable() && attempt < retries => {
                let delay = retry_delay.saturating_mul(2u32.saturating_pow(attempt));
                attempt += 1;
                tracing::warn!(
                    "🔄 Attempt {} failed ({}), retrying in {:?}",
                    attempt,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn exit_with(e: PipelineError) -> ! {
    tracing::error!(
        "❌ Label generation failed: {} (step: {}, severity: {:?})",
        e,
        e.step(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e);
    eprintln!("💡 {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code)
}
