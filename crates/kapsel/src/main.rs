#![forbid(unsafe_code)]

//! kapsel CLI: hybrid XML encryption and reference digests.

use clap::{Args, Parser, Subcommand};
use kapsel_core::{algorithm, AlgorithmFamily, Error};
use kapsel_crypto::{AlgorithmRegistry, BlockCipherFactory, DigestFactory, KeyTransportFactory};
use kapsel_dsig::{DsigContext, Transform, Transforms};
use kapsel_enc::{EncContext, Encryptable, EncryptedData};
use kapsel_keys::{AsymmetricKey, Key, SymmetricKey};
use kapsel_xml::{Element, XmlElement};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "kapsel",
    about = "kapsel: XML Encryption envelopes and XML Signature reference digests",
    version
)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Algorithm blacklist policy shared by every subcommand that resolves algorithms.
#[derive(Args)]
struct Policy {
    /// Replace the default blacklists with these algorithm URIs (repeatable)
    #[arg(long)]
    blacklist: Vec<String>,

    /// Allow algorithms that are blacklisted by default (MD5, RSA PKCS#1 v1.5)
    #[arg(long)]
    no_default_blacklist: bool,
}

impl Policy {
    fn blacklist(&self) -> Option<Vec<String>> {
        if self.no_default_blacklist || !self.blacklist.is_empty() {
            Some(self.blacklist.clone())
        } else {
            None
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an RSA key pair (PEM) or a raw symmetric key
    GenerateKey {
        /// RSA modulus size in bits
        #[arg(long, default_value_t = 2048)]
        bits: usize,

        /// Generate a symmetric key of this many bytes instead
        #[arg(long)]
        symmetric: Option<usize>,

        /// Give every byte of the symmetric key odd parity (3DES)
        #[arg(long)]
        parity: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the RSA public key (SPKI PEM) here
        #[arg(long)]
        public_out: Option<PathBuf>,
    },

    /// Encrypt a file into an EncryptedData element
    Encrypt {
        /// Input file
        file: PathBuf,

        /// Recipient public key (PEM) or raw symmetric key
        #[arg(short = 'k', long)]
        key: PathBuf,

        /// Key transport or block cipher URI (default: RSA-OAEP for RSA keys,
        /// the bulk cipher for symmetric keys)
        #[arg(long)]
        algorithm: Option<String>,

        /// Bulk cipher URI used under key transport
        #[arg(long, default_value = algorithm::AES256_GCM)]
        block_cipher: String,

        /// Session key length in bytes (default: the bulk cipher's key length)
        #[arg(long)]
        session_key_len: Option<usize>,

        /// Encrypt the input as an XML element (Type Element)
        #[arg(long)]
        element: bool,

        /// Encrypt only the children of the input's root element (Type Content)
        #[arg(long, conflicts_with = "element")]
        content: bool,

        /// MimeType attribute
        #[arg(long)]
        mime_type: Option<String>,

        /// Recipient attribute on the generated EncryptedKey
        #[arg(long)]
        recipient: Option<String>,

        #[command(flatten)]
        policy: Policy,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decrypt an EncryptedData element or a document containing one
    Decrypt {
        /// Input XML file
        file: PathBuf,

        /// Recipient private key (PEM) or raw symmetric key
        #[arg(short = 'k', long)]
        key: PathBuf,

        /// Replace the first EncryptedData in the document with its plaintext
        #[arg(long)]
        document: bool,

        #[command(flatten)]
        policy: Policy,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compute a ds:Reference over a document
    Digest {
        /// Input XML file
        file: PathBuf,

        /// Reference URI ("", "#id", "#xpointer(/)", "#xpointer(id('id'))")
        #[arg(long, default_value = "")]
        uri: String,

        /// Transform URI, applied in order (repeatable)
        #[arg(long = "transform")]
        transforms: Vec<String>,

        /// Append an XPath filter transform with this expression
        #[arg(long)]
        xpath: Option<String>,

        /// Namespace binding for the XPath expression (PREFIX=URI)
        #[arg(long = "ns", value_parser = parse_binding)]
        namespaces: Vec<(String, String)>,

        /// Digest method URI
        #[arg(long, default_value = algorithm::SHA256)]
        digest_method: String,

        /// Register additional ID attribute names
        #[arg(long = "id-attr")]
        id_attr: Vec<String>,

        #[command(flatten)]
        policy: Policy,
    },

    /// Check every ds:Reference digest in a document
    VerifyReference {
        /// Input XML file
        file: PathBuf,

        /// Register additional ID attribute names
        #[arg(long = "id-attr")]
        id_attr: Vec<String>,

        #[command(flatten)]
        policy: Policy,
    },

    /// List registered algorithms and default blacklists
    Info,
}

fn main() {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let result = match cli.command {
        Commands::GenerateKey {
            bits,
            symmetric,
            parity,
            output,
            public_out,
        } => cmd_generate_key(bits, symmetric, parity, output, public_out),

        Commands::Encrypt {
            file,
            key,
            algorithm,
            block_cipher,
            session_key_len,
            element,
            content,
            mime_type,
            recipient,
            policy,
            output,
        } => {
            let mut ctx = enc_context(&policy).with_block_cipher(&block_cipher);
            ctx.session_key_len = session_key_len;
            ctx.mime_type = mime_type;
            ctx.recipient = recipient;
            let mode = if element {
                Payload::Element
            } else if content {
                Payload::Content
            } else {
                Payload::Octets
            };
            cmd_encrypt(&ctx, file, key, algorithm, mode, output)
        }

        Commands::Decrypt {
            file,
            key,
            document,
            policy,
            output,
        } => cmd_decrypt(&enc_context(&policy), file, key, document, output),

        Commands::Digest {
            file,
            uri,
            transforms,
            xpath,
            namespaces,
            digest_method,
            id_attr,
            policy,
        } => {
            let mut chain: Vec<Transform> = transforms.iter().map(|t| Transform::new(t)).collect();
            if let Some(expression) = xpath {
                chain.push(Transform::xpath(&expression, namespaces));
            }
            cmd_digest(
                &dsig_context(&policy, &id_attr),
                file,
                &uri,
                chain,
                &digest_method,
            )
        }

        Commands::VerifyReference {
            file,
            id_attr,
            policy,
        } => cmd_verify_reference(&dsig_context(&policy, &id_attr), file),

        Commands::Info => cmd_info(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

#[derive(Clone, Copy)]
enum Payload {
    Octets,
    Element,
    Content,
}

fn enc_context(policy: &Policy) -> EncContext {
    match policy.blacklist() {
        Some(list) => EncContext::new().with_blacklist(list),
        None => EncContext::new(),
    }
}

fn dsig_context(policy: &Policy, id_attrs: &[String]) -> DsigContext {
    let mut ctx = match policy.blacklist() {
        Some(list) => DsigContext::new().with_blacklist(list),
        None => DsigContext::new(),
    };
    for attr in id_attrs {
        ctx.add_id_attr(attr);
    }
    ctx
}

fn cmd_generate_key(
    bits: usize,
    symmetric: Option<usize>,
    parity: bool,
    output: Option<PathBuf>,
    public_out: Option<PathBuf>,
) -> Result<(), Error> {
    if let Some(len) = symmetric {
        let key = SymmetricKey::generate(len, parity)?;
        return write_output(output, key.as_bytes());
    }

    let pair = AsymmetricKey::generate(bits)?;
    tracing::info!(bits = pair.size_bits(), "generated RSA key pair");
    if let Some(path) = public_out {
        std::fs::write(path, kapsel_keys::loader::public_key_to_pem(&pair)?)?;
    }
    write_output(output, kapsel_keys::loader::private_key_to_pem(&pair)?.as_bytes())
}

fn cmd_encrypt(
    ctx: &EncContext,
    file: PathBuf,
    key_path: PathBuf,
    algorithm: Option<String>,
    mode: Payload,
    output: Option<PathBuf>,
) -> Result<(), Error> {
    let key = kapsel_keys::loader::load_key_file(&key_path)?;
    let algorithm = algorithm.unwrap_or_else(|| match key {
        Key::Asymmetric(_) => algorithm::RSA_OAEP.to_owned(),
        Key::Symmetric(_) => ctx.block_cipher.clone(),
    });

    let data = match mode {
        Payload::Octets => {
            let payload = std::fs::read(&file)?;
            payload.encrypt(ctx, &algorithm, &key)?
        }
        Payload::Element => Element::parse(&std::fs::read_to_string(&file)?)?
            .encrypt(ctx, &algorithm, &key)?,
        Payload::Content => {
            let root = Element::parse(&std::fs::read_to_string(&file)?)?;
            kapsel_enc::ElementContent(&root).encrypt(ctx, &algorithm, &key)?
        }
    };
    write_output(output, data.to_element().to_xml_string().as_bytes())
}

fn cmd_decrypt(
    ctx: &EncContext,
    file: PathBuf,
    key_path: PathBuf,
    document: bool,
    output: Option<PathBuf>,
) -> Result<(), Error> {
    let xml = std::fs::read_to_string(&file)?;
    let key = kapsel_keys::loader::load_key_file(&key_path)?;
    if document {
        let plain = ctx.decrypt_document(&xml, &key)?;
        return write_output(output, plain.as_bytes());
    }
    let data = EncryptedData::parse(&xml)?;
    write_output(output, &ctx.decrypt(&data, &key)?)
}

fn cmd_digest(
    ctx: &DsigContext,
    file: PathBuf,
    uri: &str,
    chain: Vec<Transform>,
    digest_method: &str,
) -> Result<(), Error> {
    let xml = std::fs::read_to_string(&file)?;
    let doc = kapsel_xml::parse_document(&xml)?;
    let transforms = (!chain.is_empty()).then_some(Transforms(chain));
    let reference = ctx.create_reference(uri, transforms, digest_method, &ctx.document(&doc))?;
    println!("{}", reference.to_element().to_xml_string());
    Ok(())
}

fn cmd_verify_reference(ctx: &DsigContext, file: PathBuf) -> Result<(), Error> {
    let xml = std::fs::read_to_string(&file)?;
    let outcomes = ctx.verify_references(&xml)?;
    if outcomes.is_empty() {
        eprintln!("INVALID: no ds:Reference found");
        process::exit(1);
    }

    let mut all_valid = true;
    for outcome in &outcomes {
        let status = if outcome.valid { "OK" } else { "INVALID" };
        println!("{status} URI=\"{}\"", outcome.uri);
        all_valid &= outcome.valid;
    }
    if !all_valid {
        process::exit(1);
    }
    Ok(())
}

fn cmd_info() -> Result<(), Error> {
    let registry = AlgorithmRegistry::shared();
    println!("kapsel: XML Encryption and XML Signature references");
    for family in [
        AlgorithmFamily::Digest,
        AlgorithmFamily::BlockCipher,
        AlgorithmFamily::KeyTransport,
        AlgorithmFamily::Signature,
    ] {
        println!();
        println!("Registered {family} algorithms:");
        for uri in registry.uris(family) {
            println!("  {uri}");
        }
    }

    println!();
    println!("Blacklisted by default:");
    let defaults = DigestFactory::new(None)
        .blacklist()
        .chain(BlockCipherFactory::new(None).blacklist())
        .chain(KeyTransportFactory::new(None).blacklist())
        .map(str::to_owned)
        .collect::<Vec<_>>();
    for uri in defaults {
        println!("  {uri}");
    }

    println!();
    println!("Transforms:");
    for uri in kapsel_transforms::TransformRegistry::with_defaults().uris() {
        println!("  {uri}");
    }
    Ok(())
}

// ── Utility functions ────────────────────────────────────────────────

fn parse_binding(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(prefix, uri)| (prefix.to_owned(), uri.to_owned()))
        .ok_or_else(|| format!("invalid namespace binding: {s} (expected PREFIX=URI)"))
}

fn write_output(path: Option<PathBuf>, data: &[u8]) -> Result<(), Error> {
    match path {
        Some(p) => Ok(std::fs::write(p, data)?),
        None => {
            use std::io::Write;
            Ok(std::io::stdout().write_all(data)?)
        }
    }
}
