use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{error, info};

use ecoholiday_admin::api::bento::{self, BentoSource, BENTO_SECTIONS};
use ecoholiday_admin::api::bookings::{self, BookingsSource};
use ecoholiday_admin::api::feedback::FeedbackSource;
use ecoholiday_admin::api::gallery::{self, GallerySource};
use ecoholiday_admin::api::pricing::{self, PricingEditor, PricingSource};
use ecoholiday_admin::api::reels::{ReelDraft, ReelsSource};
use ecoholiday_admin::api::room_images::{self, RoomGallery, RoomImagesSource};
use ecoholiday_admin::app::AdminApp;
use ecoholiday_admin::collection::{DeleteOutcome, Placement, RemoteCollection};
use ecoholiday_admin::config;
use ecoholiday_admin::error::ApiError;
use ecoholiday_admin::gate::{AdminView, GateDecision};
use ecoholiday_admin::model::{bento_section, RoomImages, RoomType};
use ecoholiday_admin::upload::MediaFile;

#[derive(Debug, Parser)]
#[command(author, version, about = "EcoHoliday resort admin console")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write an example config file
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Store an admin token issued by the backend
    Login {
        #[arg(long)]
        token: String,
    },
    Logout,
    /// Show session state and what each admin section holds
    Status,
    /// Show where a navigation path leads for the current session
    Route { path: String },
    #[command(subcommand)]
    Bookings(BookingsCmd),
    #[command(subcommand)]
    Reels(ReelsCmd),
    #[command(subcommand)]
    Gallery(GalleryCmd),
    #[command(subcommand)]
    Rooms(RoomsCmd),
    #[command(subcommand)]
    Bento(BentoCmd),
    #[command(subcommand)]
    Pricing(PricingCmd),
    #[command(subcommand)]
    Feedback(FeedbackCmd),
}

#[derive(Debug, ClapArgs)]
struct DeleteArgs {
    id: String,
    /// Skip the confirmation prompt
    #[arg(long)]
    yes: bool,
}

#[derive(Debug, Subcommand)]
enum BookingsCmd {
    List,
    /// Flip between pending and confirmed
    Toggle { id: String },
    Delete(DeleteArgs),
}

#[derive(Debug, Subcommand)]
enum ReelsCmd {
    List,
    Upload {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    Delete(DeleteArgs),
}

#[derive(Debug, Subcommand)]
enum GalleryCmd {
    List {
        #[arg(long)]
        category: Option<String>,
    },
    Upload {
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long, default_value = "PROPERTY")]
        category: String,
    },
    Delete(DeleteArgs),
}

#[derive(Debug, Subcommand)]
enum RoomsCmd {
    List {
        #[arg(long)]
        room: Option<String>,
    },
    Add {
        #[arg(long)]
        room: String,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    Replace {
        #[arg(long)]
        room: String,
        #[arg(long)]
        index: usize,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    Feature {
        #[arg(long)]
        room: String,
        #[arg(long)]
        public_id: String,
    },
    Remove {
        #[arg(long)]
        room: String,
        #[arg(long)]
        public_id: String,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Subcommand)]
enum BentoCmd {
    List,
    Edit {
        id: String,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        text: Option<String>,
        /// Replacement image, uploaded before the edit is saved
        #[arg(long)]
        file: Option<PathBuf>,
    },
    Create {
        #[arg(long)]
        slot: u32,
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "")]
        text: String,
    },
    Delete(DeleteArgs),
}

#[derive(Debug, Subcommand)]
enum PricingCmd {
    Show { path: Option<String> },
    /// Set a dotted field such as `party.adult`
    Set { path: String, value: String },
}

#[derive(Debug, Subcommand)]
enum FeedbackCmd {
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();

    if let Command::Init { force } = args.command {
        if args.config.exists() && !force {
            bail!("{} already exists; pass --force to overwrite", args.config.display());
        }
        std::fs::write(&args.config, config::example())
            .with_context(|| format!("writing {}", args.config.display()))?;
        info!(path = %args.config.display(), "wrote example config");
        return Ok(());
    }

    let cfg = config::load(Some(&args.config))
        .with_context(|| format!("loading {}", args.config.display()))?;
    let app = AdminApp::start(cfg).await?;

    match run(&app, args.command).await {
        Err(err) if matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized)) => {
            error!("not signed in or session expired; run `login --token <TOKEN>`");
            Err(err)
        }
        other => other,
    }
}

async fn run(app: &AdminApp, command: Command) -> Result<()> {
    match command {
        Command::Init { .. } => bail!("init runs before the config is loaded"),
        Command::Login { token } => {
            let credential = app.login(&token).await?;
            match credential.expires_at() {
                Some(exp) => println!("Signed in until {}", exp.to_rfc3339()),
                None => println!("Signed in"),
            }
        }
        Command::Logout => {
            app.session.logout().await?;
            println!("Signed out");
        }
        Command::Status => status(app).await?,
        Command::Route { path } => match app.gate.navigate(&path) {
            GateDecision::Render(view) => println!("{} ({})", view.path(), view.title()),
            GateDecision::Redirect(to) => println!("redirect {}", to),
        },
        Command::Bookings(cmd) => bookings_cmd(app, cmd).await?,
        Command::Reels(cmd) => reels_cmd(app, cmd).await?,
        Command::Gallery(cmd) => gallery_cmd(app, cmd).await?,
        Command::Rooms(cmd) => rooms_cmd(app, cmd).await?,
        Command::Bento(cmd) => bento_cmd(app, cmd).await?,
        Command::Pricing(cmd) => pricing_cmd(app, cmd).await?,
        Command::Feedback(FeedbackCmd::List) => {
            app.open(AdminView::Feedback)?;
            let feedback = RemoteCollection::new(FeedbackSource::new(app.api.clone()));
            feedback.load().await?;
            for f in feedback.items() {
                println!(
                    "{}  {}  <{}>  {}",
                    f.id,
                    f.name,
                    f.email.as_deref().unwrap_or("-"),
                    f.message.replace('\n', " ")
                );
            }
        }
    }
    Ok(())
}

/// Stdin yes/no prompt, or an unconditional yes for `--yes`.
fn confirm(assume_yes: bool) -> impl Fn(&str) -> bool {
    move |prompt: &str| {
        if assume_yes {
            return true;
        }
        print!("{} [y/N] ", prompt);
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim(), "y" | "Y" | "yes")
    }
}

fn report_delete(outcome: DeleteOutcome, id: &str) {
    match outcome {
        DeleteOutcome::Deleted => println!("Deleted {}", id),
        DeleteOutcome::Declined => println!("Kept {}", id),
    }
}

async fn read_file(path: Option<PathBuf>) -> Result<Option<MediaFile>> {
    match path {
        Some(p) => Ok(Some(MediaFile::read(&p).await?)),
        None => Ok(None),
    }
}

fn room_type(raw: &str) -> Result<RoomType> {
    match RoomType::parse(raw) {
        Some(room) => Ok(room),
        None => bail!("unknown room type '{}'; expected cottage, villa or poolRoom", raw),
    }
}

async fn status(app: &AdminApp) -> Result<()> {
    match app.session.snapshot() {
        Some(c) if app.session.is_authenticated() => println!(
            "Signed in{}",
            c.expires_at()
                .map(|e| format!(" until {}", e.to_rfc3339()))
                .unwrap_or_default()
        ),
        Some(_) => println!("Session expired"),
        None => println!("Signed out"),
    }
    if !app.session.is_authenticated() {
        return Ok(());
    }

    let bookings = RemoteCollection::new(BookingsSource::new(app.api.clone()));
    let reels = RemoteCollection::new(ReelsSource::new(app.api.clone()));
    let gallery = RemoteCollection::new(GallerySource::new(app.api.clone()));
    let feedback = RemoteCollection::new(FeedbackSource::new(app.api.clone()));
    let (b, r, g, f) = futures::join!(bookings.load(), reels.load(), gallery.load(), feedback.load());
    for (view, loaded) in [
        (AdminView::Bookings, b),
        (AdminView::Reels, r),
        (AdminView::Gallery, g),
        (AdminView::Feedback, f),
    ] {
        match loaded {
            Ok(count) => println!("  {:<12} {:>4}  {}", view.title(), count, view.path()),
            Err(err) => println!("  {:<12}  err  {} ({})", view.title(), view.path(), err.kind().as_str()),
        }
    }
    Ok(())
}

async fn bookings_cmd(app: &AdminApp, cmd: BookingsCmd) -> Result<()> {
    app.open(AdminView::Bookings)?;
    let bookings = RemoteCollection::new(BookingsSource::new(app.api.clone()));
    bookings.load().await?;
    match cmd {
        BookingsCmd::List => {
            for b in bookings.items() {
                println!(
                    "{}  {:<10} {}  {}",
                    b.id,
                    b.status,
                    b.name.as_deref().unwrap_or("-"),
                    b.created_at.map(|d| d.to_rfc3339()).unwrap_or_default()
                );
            }
        }
        BookingsCmd::Toggle { id } => {
            let status = bookings::toggle_status(&bookings, &id).await?;
            println!("{} is now {}", id, status);
        }
        BookingsCmd::Delete(args) => {
            let outcome = bookings.delete(&args.id, &confirm(args.yes)).await?;
            report_delete(outcome, &args.id);
        }
    }
    Ok(())
}

async fn reels_cmd(app: &AdminApp, cmd: ReelsCmd) -> Result<()> {
    app.open(AdminView::Reels)?;
    let reels = RemoteCollection::new(ReelsSource::new(app.api.clone()));
    reels.load().await?;
    match cmd {
        ReelsCmd::List => {
            for r in reels.items() {
                println!("{}  {}  {}", r.id, r.title, r.video_url.as_deref().unwrap_or("-"));
            }
        }
        ReelsCmd::Upload {
            title,
            description,
            file,
        } => {
            let draft = ReelDraft {
                title,
                description,
                video: read_file(file).await?,
            };
            let reel = reels.create(draft, Placement::Front).await?;
            println!("Uploaded reel {}", reel.id);
        }
        ReelsCmd::Delete(args) => {
            let outcome = reels.delete(&args.id, &confirm(args.yes)).await?;
            report_delete(outcome, &args.id);
        }
    }
    Ok(())
}

async fn gallery_cmd(app: &AdminApp, cmd: GalleryCmd) -> Result<()> {
    app.open(AdminView::Gallery)?;
    let images = RemoteCollection::new(GallerySource::new(app.api.clone()));
    images.load().await?;
    match cmd {
        GalleryCmd::List { category } => {
            let category = category.as_deref().map(gallery::normalize_category).transpose()?;
            for img in images.items() {
                if category.is_some_and(|c| c != img.category) {
                    continue;
                }
                println!("{}  {:<15} {}", img.id, img.category, img.url);
            }
        }
        GalleryCmd::Upload { file, category } => {
            let file = read_file(file).await?;
            let img = gallery::upload_image(&images, &app.uploader(), file.as_ref(), &category).await?;
            println!("Added {} ({})", img.id, img.url);
        }
        GalleryCmd::Delete(args) => {
            let outcome = images.delete(&args.id, &confirm(args.yes)).await?;
            report_delete(outcome, &args.id);
        }
    }
    Ok(())
}

async fn rooms_cmd(app: &AdminApp, cmd: RoomsCmd) -> Result<()> {
    app.open(AdminView::RoomImages)?;
    let rooms = RoomGallery::new(RoomImagesSource::new(app.api.clone()));
    rooms.load().await?;
    let uploader = app.uploader();
    let doc = match cmd {
        RoomsCmd::List { room } => {
            let filter = room.as_deref().map(room_type).transpose()?;
            let doc = rooms.current().context("room images not loaded")?;
            print_rooms(&doc, filter);
            return Ok(());
        }
        RoomsCmd::Add { room, file } => {
            let file = read_file(file).await?;
            room_images::add(&rooms, &uploader, room_type(&room)?, file.as_ref()).await?
        }
        RoomsCmd::Replace { room, index, file } => {
            let file = read_file(file).await?;
            room_images::replace(&rooms, &uploader, room_type(&room)?, index, file.as_ref()).await?
        }
        RoomsCmd::Feature { room, public_id } => {
            room_images::set_featured(&rooms, room_type(&room)?, &public_id).await?
        }
        RoomsCmd::Remove {
            room,
            public_id,
            yes,
        } => {
            if !confirm(yes)(format!("Delete room image {}?", public_id).as_str()) {
                println!("Kept {}", public_id);
                return Ok(());
            }
            room_images::remove(&rooms, &uploader, room_type(&room)?, &public_id).await?
        }
    };
    print_rooms(&doc, None);
    Ok(())
}

fn print_rooms(doc: &RoomImages, only: Option<RoomType>) {
    for room in RoomType::ALL {
        if only.is_some_and(|r| r != room) {
            continue;
        }
        println!("{}:", room.as_str());
        for (i, img) in doc.get(room).iter().enumerate() {
            let star = if img.is_featured { "*" } else { " " };
            println!("  {}{:>2} {}  {}", star, i, img.public_id, img.url);
        }
    }
}

async fn bento_cmd(app: &AdminApp, cmd: BentoCmd) -> Result<()> {
    app.open(AdminView::Bento)?;
    let tiles = RemoteCollection::new(BentoSource::new(app.api.clone()));
    tiles.load().await?;
    match cmd {
        BentoCmd::List => {
            let items = tiles.items();
            for (title, start, end) in BENTO_SECTIONS {
                println!("{}:", title);
                for b in bento_section(items.iter().map(|b| &**b), start, end) {
                    println!("  {:>2}  {}  {}  {}", b.bento_id, b.id, b.img_text, b.url);
                }
            }
        }
        BentoCmd::Edit { id, url, text, file } => {
            let file = read_file(file).await?;
            let tile = bento::edit_tile(&tiles, &app.uploader(), &id, url, text, file.as_ref()).await?;
            println!("Updated tile {} -> {}", tile.bento_id, tile.url);
        }
        BentoCmd::Create { slot, url, text } => {
            let tile = tiles
                .create(
                    bento::NewBento {
                        bento_id: slot.to_string(),
                        url,
                        img_text: text,
                    },
                    Placement::Back,
                )
                .await?;
            println!("Created tile {} in slot {}", tile.id, tile.bento_id);
        }
        BentoCmd::Delete(args) => {
            let outcome = tiles.delete(&args.id, &confirm(args.yes)).await?;
            report_delete(outcome, &args.id);
        }
    }
    Ok(())
}

async fn pricing_cmd(app: &AdminApp, cmd: PricingCmd) -> Result<()> {
    app.open(AdminView::Pricing)?;
    let editor = PricingEditor::new(PricingSource::new(app.api.clone()));
    let doc = editor.load().await?;
    match cmd {
        PricingCmd::Show { path } => {
            let value = match &path {
                Some(p) => doc
                    .get_path(p)
                    .cloned()
                    .with_context(|| format!("no pricing field '{}'", p))?,
                None => serde_json::Value::Object(doc.0.clone()),
            };
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        PricingCmd::Set { path, value } => {
            let saved = pricing::set_field(&editor, &path, pricing::parse_value(&value)).await?;
            let shown = saved.get_path(&path).cloned().unwrap_or_default();
            println!("{} = {}", path, shown);
        }
    }
    Ok(())
}
