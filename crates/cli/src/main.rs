use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tokio::time::Duration;
use tracing::{debug, info};
use url::Url;

use zatiaras_common::{Branch, StorageError, ZatiarasResult};
use zatiaras_order::{
    BranchContact, BranchDirectory, Cart, CartStore, LineKey, Product, WhatsAppNumber, format_rupiah,
    handle_whatsapp_order,
};
use zatiaras_perf::sim::{SimConnection, SimDocument, SimMemory};
use zatiaras_perf::{
    Capabilities, ConnectionInfo, DeviceProfile, EffectiveType, PerfConfig, PerformanceEntry, PerformanceIntegration,
};
use zatiaras_storage::{CacheConfig, CacheManager, FileStorage, PersistPolicy, SystemClock};

const CONTACTS_FILE: &str = "contacts.json";
const MB: u64 = 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "zatiaras-cli", about = "Zatiaras Juice: carrinho, pedidos e cache")]
struct Cli {
    /// Diretório onde carrinho e cache são persistidos
    #[arg(long, value_name = "DIR", default_value = ".zatiaras")]
    data_dir: PathBuf,
    /// JSON com os contatos das filiais (padrão: <DIR>/contacts.json)
    #[arg(long, value_name = "FILE")]
    contacts: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Operações no carrinho
    #[command(subcommand)]
    Cart(CartCommand),
    /// Envia o carrinho para o WhatsApp da filial e esvazia o carrinho
    Order {
        /// Filial da página, usada se o carrinho não tiver uma
        #[arg(long)]
        branch: Branch,
        /// Número de WhatsApp no lugar do arquivo de contatos
        #[arg(long)]
        phone: Option<WhatsAppNumber>,
    },
    /// Links de delivery da filial
    Links { branch: Branch },
    /// Cache persistido
    #[command(subcommand)]
    Cache(CacheCommand),
    /// Auditoria de performance com capacidades simuladas
    Audit(AuditArgs),
}

#[derive(Subcommand, Debug)]
enum CartCommand {
    Add(AddArgs),
    /// Remove a linha (id, tamanho) ou, com --all, todas as linhas do produto
    Remove {
        id: String,
        #[arg(long)]
        size: Option<String>,
        #[arg(long, conflicts_with = "size")]
        all: bool,
    },
    /// Define a quantidade (mínimo 1)
    Qty {
        id: String,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
        #[arg(long)]
        size: Option<String>,
    },
    Clear,
    Branch { branch: Branch },
    Show {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct AddArgs {
    id: String,
    name: String,
    /// Preço unitário em Rupiah
    #[arg(long)]
    price: u64,
    #[arg(long)]
    size: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    image: Option<String>,
    /// Quantas vezes adicionar
    #[arg(long, default_value_t = 1)]
    times: u32,
}

impl AddArgs {
    fn product(&self) -> Product {
        let mut product = Product::new(&self.id, &self.name, self.price);
        if let Some(size) = &self.size {
            product = product.with_size(size);
        }
        if let Some(category) = &self.category {
            product = product.with_category(category);
        }
        product.image = self.image.clone();
        product
    }
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Grava um valor (JSON, ou texto puro)
    Set {
        key: String,
        value: String,
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
    Get { key: String },
    Del { key: String },
    /// Remove as entradas expiradas
    Sweep,
    Stats,
}

#[derive(Args, Debug)]
struct AuditArgs {
    #[arg(long, default_value_t = 4)]
    cores: u32,
    #[arg(long, default_value_t = 4.0)]
    memory_gb: f32,
    #[arg(long)]
    reduced_motion: bool,
    #[arg(long)]
    save_data: bool,
    /// slow-2g, 2g, 3g ou 4g
    #[arg(long, default_value = "4g")]
    connection: String,
    #[arg(long)]
    heap_used_mb: Option<u64>,
    #[arg(long, default_value_t = 2048)]
    heap_limit_mb: u64,
    /// Métricas medidas (ms; CLS sem unidade)
    #[arg(long)]
    lcp: Option<f64>,
    #[arg(long)]
    fid: Option<f64>,
    #[arg(long)]
    inp: Option<f64>,
    #[arg(long)]
    cls: Option<f64>,
    #[arg(long)]
    fcp: Option<f64>,
    #[arg(long)]
    ttfb: Option<f64>,
    /// Imprime também o relatório consolidado
    #[arg(long)]
    full: bool,
}

impl AuditArgs {
    fn capabilities(&self) -> Capabilities {
        let connection = ConnectionInfo {
            effective_type: EffectiveType::parse(&self.connection),
            save_data: self.save_data,
            ..ConnectionInfo::default()
        };
        let mut caps = Capabilities::headless()
            .with_document(Arc::new(SimDocument::new()))
            .with_connection(Arc::new(SimConnection::new(connection)))
            .with_observers(true, true)
            .with_device(DeviceProfile {
                cpu_cores: self.cores,
                memory_gb: self.memory_gb,
                reduced_motion: self.reduced_motion,
                save_data: self.save_data,
            });
        if let Some(used) = self.heap_used_mb {
            caps = caps.with_memory(Arc::new(SimMemory::new(
                used.saturating_mul(MB),
                self.heap_limit_mb.saturating_mul(MB),
            )));
        }
        caps
    }

    fn entries(&self) -> Vec<PerformanceEntry> {
        let mut entries = Vec::new();
        if let Some(v) = self.lcp {
            entries.push(PerformanceEntry::LargestContentfulPaint { start_time: v });
        }
        if let Some(v) = self.fid {
            entries.push(PerformanceEntry::FirstInput {
                start_time: 0.0,
                processing_start: v,
            });
        }
        if let Some(v) = self.inp {
            entries.push(PerformanceEntry::Event { duration: v });
        }
        if let Some(v) = self.cls {
            entries.push(PerformanceEntry::LayoutShift {
                value: v,
                had_recent_input: false,
            });
        }
        if let Some(v) = self.fcp {
            entries.push(PerformanceEntry::Paint {
                name: "first-contentful-paint".into(),
                start_time: v,
            });
        }
        if let Some(v) = self.ttfb {
            entries.push(PerformanceEntry::Navigation {
                request_start: 0.0,
                response_start: v,
            });
        }
        entries
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zatiaras_cli=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let storage = FileStorage::open(&cli.data_dir)
        .with_context(|| format!("abrindo {}", cli.data_dir.display()))?;
    debug!("storage em {}", storage.dir().display());

    match cli.command {
        Command::Cart(cmd) => run_cart(cmd, storage),
        Command::Order { branch, phone } => {
            let contacts = contacts_path(&cli.data_dir, cli.contacts.as_deref());
            run_order(storage, &contacts, branch, phone)
        }
        Command::Links { branch } => {
            let contacts = contacts_path(&cli.data_dir, cli.contacts.as_deref());
            let directory = load_directory(&contacts)?;
            let links = directory.delivery_links(branch);
            if links.is_empty() {
                println!("nenhum link de delivery para {}", branch.display_name());
            }
            for link in links {
                println!("{}: {}", link.platform, link.url);
            }
            Ok(())
        }
        Command::Cache(cmd) => run_cache(cmd, open_cache(&storage)),
        Command::Audit(args) => run_audit(args, open_cache(&storage)).await,
    }
}

fn run_cart(cmd: CartCommand, storage: FileStorage) -> anyhow::Result<()> {
    let mut store = CartStore::load(storage);

    match cmd {
        CartCommand::Add(args) => {
            for _ in 0..args.times {
                store.add_to_cart(args.product());
            }
        }
        CartCommand::Remove { id, size, all } => {
            let removed = if all {
                store.remove_product(&id)
            } else {
                usize::from(store.remove_from_cart(&LineKey::new(&id, size.as_deref())))
            };
            if removed == 0 {
                anyhow::bail!("'{id}' não está no carrinho");
            }
        }
        CartCommand::Qty { id, quantity, size } => {
            if !store.update_quantity(&LineKey::new(&id, size.as_deref()), quantity) {
                anyhow::bail!("'{id}' não está no carrinho");
            }
        }
        CartCommand::Clear => store.clear_cart(),
        CartCommand::Branch { branch } => store.set_branch(branch),
        CartCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(store.cart())?);
                return Ok(());
            }
        }
    }

    print!("{}", render_cart(store.cart()));
    Ok(())
}

fn render_cart(cart: &Cart) -> String {
    let mut out = String::new();
    let branch = cart.branch().map(|b| b.display_name()).unwrap_or("(nenhuma)");
    // write! em String não falha
    let _ = writeln!(out, "Filial: {branch}");
    if cart.is_empty() {
        let _ = writeln!(out, "Carrinho vazio");
        return out;
    }
    for (i, item) in cart.items().iter().enumerate() {
        let size = item.size.as_deref().map(|s| format!(" ({s})")).unwrap_or_default();
        let _ = writeln!(
            out,
            "{}. {}{size} {}x @ {} = {}",
            i + 1,
            item.name,
            item.quantity,
            format_rupiah(item.price),
            format_rupiah(item.subtotal())
        );
    }
    let _ = writeln!(
        out,
        "Total: {} itens, {}",
        cart.total_items(),
        format_rupiah(cart.total_price())
    );
    out
}

fn contacts_path(data_dir: &Path, contacts: Option<&Path>) -> PathBuf {
    contacts
        .map(Path::to_path_buf)
        .unwrap_or_else(|| data_dir.join(CONTACTS_FILE))
}

/// Arquivo ausente vira diretório vazio.
fn load_directory(path: &Path) -> ZatiarasResult<BranchDirectory> {
    if !path.exists() {
        debug!("sem arquivo de contatos em {}", path.display());
        return Ok(BranchDirectory::new());
    }
    let json = std::fs::read_to_string(path)?;
    let directory = BranchDirectory::from_json(&json).map_err(StorageError::from)?;
    Ok(directory)
}

fn run_order(
    storage: FileStorage,
    contacts: &Path,
    branch: Branch,
    phone: Option<WhatsAppNumber>,
) -> anyhow::Result<()> {
    let mut store = CartStore::load(storage);
    let mut directory = load_directory(contacts)?;

    if let Some(whatsapp) = phone {
        let target = store.cart().branch().unwrap_or(branch);
        let delivery = directory.delivery_links(target).to_vec();
        directory = directory.with_contact(target, BranchContact { whatsapp, delivery });
    }

    let mut opener = |url: &Url| println!("{url}");
    match handle_whatsapp_order(&mut store, &directory, branch, &mut opener)? {
        Some(url) => info!("pedido enviado: {}", url.path()),
        None => println!("carrinho vazio, nada a enviar"),
    }
    Ok(())
}

fn open_cache(storage: &FileStorage) -> CacheManager {
    let config = CacheConfig {
        persist: PersistPolicy::Always,
        ..CacheConfig::default()
    };
    CacheManager::with_storage(config, Arc::new(SystemClock), Arc::new(storage.clone()))
}

/// JSON válido é gravado como tal; o resto vira string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn run_cache(cmd: CacheCommand, cache: CacheManager) -> anyhow::Result<()> {
    match cmd {
        CacheCommand::Set { key, value, ttl_secs } => {
            let ttl = ttl_secs.map(Duration::from_secs);
            if !cache.set(&key, parse_value(&value), ttl) {
                anyhow::bail!("'{key}' não cabe no cache (limite {} bytes)", cache.max_bytes());
            }
            println!("OK");
        }
        CacheCommand::Get { key } => match cache.get(&key) {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => println!("(nil)"),
        },
        CacheCommand::Del { key } => {
            println!("{}", u8::from(cache.delete(&key)));
        }
        CacheCommand::Sweep => {
            println!("{} entradas expiradas removidas", cache.sweep_expired());
        }
        CacheCommand::Stats => {
            println!("{}", serde_json::to_string_pretty(&cache.stats())?);
        }
    }
    Ok(())
}

async fn run_audit(args: AuditArgs, cache: CacheManager) -> anyhow::Result<()> {
    let caps = args.capabilities();
    caps.require_document()?;

    let perf = PerformanceIntegration::new(PerfConfig::default(), caps, cache);
    for entry in args.entries() {
        perf.monitor().record(entry);
    }
    for event in perf.health_check() {
        debug!("health: {event:?}");
    }

    println!("{}", serde_json::to_string_pretty(&perf.audit())?);
    if args.full {
        println!("{}", serde_json::to_string_pretty(&perf.report())?);
    }
    perf.cleanup().await;
    Ok(())
}
