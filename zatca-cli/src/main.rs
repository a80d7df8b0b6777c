use anyhow::{Context, Result};
use base64ct::{Base64, Encoding};
use clap::{Parser, Subcommand};
use k256::pkcs8::{EncodePrivateKey, LineEnding};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zatca_core::certificate::Certificate;
use zatca_core::config::{Config, EnvironmentType, ENV_VAR};
use zatca_core::csr::{CsrError, CsrProperties, ToBase64String};
use zatca_core::invoice::hash::invoice_hash_base64;
use zatca_core::invoice::qr::{self, QrPayload};
use zatca_core::invoice::request::SubmissionRequest;
use zatca_core::invoice::sign::{parse_private_key, InvoiceSigner};
use zatca_core::invoice::verify::{load_signed_invoice, verify_signed_invoice};

#[derive(Parser)]
#[command(name = "zatca")]
#[command(about = "ZATCA e-invoice signing CLI")]
struct Cli {
    /// Target environment: non_production, simulation or production.
    #[arg(long, global = true, env = ENV_VAR, default_value = "non_production")]
    env: EnvironmentType,

    /// Largest accepted base64 QR payload.
    #[arg(long, global = true, default_value_t = zatca_core::config::DEFAULT_QR_MAX_LEN)]
    qr_max_len: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a CSR and private key from a CSR properties file.
    Csr {
        #[arg(long)]
        csr_config: PathBuf,
        #[arg(long, default_value = "generated-private-key")]
        private_key: PathBuf,
        #[arg(long, default_value = "generated-csr")]
        generated_csr: PathBuf,
        /// Write PEM instead of base64 DER.
        #[arg(long)]
        pem: bool,
    },
    /// Check a CSR properties file without generating anything.
    ValidateCsr {
        #[arg(long)]
        csr_config: PathBuf,
    },
    Sign {
        #[arg(long)]
        invoice: PathBuf,
        #[arg(long)]
        cert: PathBuf,
        #[arg(long)]
        key: PathBuf,
        #[arg(long)]
        signed_invoice: Option<PathBuf>,
    },
    GenerateHash {
        #[arg(long)]
        invoice: PathBuf,
    },
    /// Print the invoice's QR payload (embedded one if signed).
    Qr {
        #[arg(long)]
        invoice: PathBuf,
        /// Print the TLV fields instead of the base64 payload.
        #[arg(long)]
        decode: bool,
    },
    Verify {
        #[arg(long)]
        invoice: PathBuf,
    },
    /// Build the reporting/clearance JSON body for a signed invoice.
    InvoiceRequest {
        #[arg(long)]
        invoice: PathBuf,
        #[arg(long)]
        api_request: Option<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::new(cli.env).with_qr_max_len(cli.qr_max_len);

    match cli.command {
        Commands::Csr {
            csr_config,
            private_key,
            generated_csr,
            pem,
        } => {
            let props = CsrProperties::parse_csr_config(&csr_config)?;
            let (csr, key) = props.build_with_rng(config.env())?;
            if pem {
                let csr_pem = Base64::decode_vec(&csr.to_pem_base64_string()?)
                    .context("decoding CSR PEM")?;
                write_output(&generated_csr, &csr_pem)?;
                let key_pem = key
                    .to_pkcs8_pem(LineEnding::LF)
                    .context("encoding private key")?;
                write_output(&private_key, key_pem.as_bytes())?;
            } else {
                write_output(&generated_csr, csr.to_base64_string()?.as_bytes())?;
                let key_der = key.to_pkcs8_der().context("encoding private key")?;
                write_output(&private_key, key_der.as_bytes())?;
            }
            info!(env = %config.env(), csr = %generated_csr.display(), "CSR generated");
        }
        Commands::ValidateCsr { csr_config } => {
            return validate_csr(&csr_config);
        }
        Commands::Sign {
            invoice,
            cert,
            key,
            signed_invoice,
        } => {
            let signer = load_signer(&cert, &key)?.with_config(&config);
            let result = signer.sign_xml(&read_invoice(&invoice)?)?;
            match signed_invoice {
                Some(path) => {
                    write_output(&path, result.invoice().as_bytes())?;
                    info!(hash = result.hash(), path = %path.display(), "signed invoice written");
                }
                None => println!("{}", result.invoice()),
            }
        }
        Commands::GenerateHash { invoice } => {
            println!("{}", invoice_hash_base64(&read_invoice(&invoice)?)?);
        }
        Commands::Qr { invoice, decode } => {
            let xml = read_invoice(&invoice)?;
            let payload = match qr::embedded_qr(&xml)? {
                Some(embedded) => embedded,
                None => QrPayload::from_invoice_xml(&xml)?.encode(config.qr_max_len())?,
            };
            if decode {
                for (tag, value) in qr::decode(&payload)? {
                    match String::from_utf8(value) {
                        Ok(text) if tag < 8 => println!("{tag}: {text}"),
                        Ok(text) => println!("{tag}: {}", Base64::encode_string(text.as_bytes())),
                        Err(e) => println!("{tag}: {}", Base64::encode_string(e.as_bytes())),
                    }
                }
            } else {
                println!("{payload}");
            }
        }
        Commands::Verify { invoice } => {
            let result = load_signed_invoice(&read_invoice(&invoice)?)?;
            verify_signed_invoice(&result)?;
            println!("OK");
        }
        Commands::InvoiceRequest {
            invoice,
            api_request,
        } => {
            let result = load_signed_invoice(&read_invoice(&invoice)?)?;
            verify_signed_invoice(&result)?;
            let json = serde_json::to_string_pretty(&SubmissionRequest::from_result(&result)?)?;
            match api_request {
                Some(path) => write_output(&path, json.as_bytes())?,
                None => println!("{json}"),
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Exit code 2 marks a CSR validation failure; I/O and parse failures stay errors.
fn validate_csr(path: &Path) -> Result<ExitCode> {
    let failure = match CsrProperties::parse_csr_config(path) {
        Ok(props) => props.validate().err(),
        Err(CsrError::Validation(err)) => Some(err),
        Err(other) => return Err(other.into()),
    };
    match failure {
        None => {
            println!("OK");
            Ok(ExitCode::SUCCESS)
        }
        Some(err) => {
            eprintln!("{err}");
            eprintln!("code: {}", err.code());
            Ok(ExitCode::from(2))
        }
    }
}

fn read_invoice(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading invoice {}", path.display()))
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
}

/// Accepts the certificate as PEM, base64 DER text or raw DER.
fn load_certificate(path: &Path) -> Result<Certificate> {
    let bytes = fs::read(path).with_context(|| format!("reading certificate {}", path.display()))?;
    let certificate = match std::str::from_utf8(&bytes) {
        Ok(text) if text.contains("-----BEGIN") => Certificate::from_pem(text)?,
        Ok(text) => Certificate::from_base64_der(text)?,
        Err(_) => Certificate::from_der(&bytes)?,
    };
    Ok(certificate)
}

fn load_signer(cert: &Path, key: &Path) -> Result<InvoiceSigner> {
    let certificate = load_certificate(cert)?;
    let key_bytes = fs::read(key).with_context(|| format!("reading private key {}", key.display()))?;
    let signer = InvoiceSigner::new(Arc::new(certificate), parse_private_key(&key_bytes)?)?;
    Ok(signer)
}
