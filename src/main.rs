use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use segment_ranges::config_loader;
use segment_ranges::store::{Pager, RangeFilters, SortKey};
use segment_ranges::types::{NetworkType, SegmentationId};
use segment_ranges::{CreateRange, Datastore, RangeRepository, RangeService, SegmentTypeManager, UpdateRange};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Manage network segment ranges and their allocation pools
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the host configuration YAML file
    #[arg(short, long, default_value = "segrange.yaml")]
    config: PathBuf,

    /// State file, overriding `general.state_file` from the configuration
    #[arg(short, long)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seed default ranges from the configuration and rebuild the pools
    Init,
    /// List ranges
    List(ListArgs),
    /// Show one range
    Show { id: Uuid },
    /// Create a range
    Create(CreateArgs),
    /// Update a range
    Update {
        id: Uuid,
        #[command(flatten)]
        changes: UpdateArgs,
    },
    /// Delete a range
    Delete { id: Uuid },
    /// Allocate the lowest free segment for a project
    Allocate {
        #[arg(long)]
        network_type: NetworkType,
        #[arg(long)]
        physical_network: Option<String>,
        #[arg(long)]
        project_id: String,
    },
    /// Reserve a specific segmentation ID for a project
    Reserve {
        #[arg(long)]
        network_type: NetworkType,
        #[arg(long)]
        physical_network: Option<String>,
        #[arg(long)]
        segmentation_id: SegmentationId,
        #[arg(long)]
        project_id: String,
    },
    /// Release a live segment
    Release { segment_id: Uuid },
}

impl Command {
    fn is_mutation(&self) -> bool {
        !matches!(self, Command::List(_) | Command::Show { .. })
    }
}

#[derive(ClapArgs, Debug)]
struct ListArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    network_type: Option<NetworkType>,
    #[arg(long)]
    physical_network: Option<String>,
    #[arg(long)]
    project_id: Option<String>,
    #[arg(long)]
    shared: Option<bool>,
    #[arg(long)]
    default: Option<bool>,
    /// Sort key as `field[:asc|desc]`, may be repeated
    #[arg(long = "sort")]
    sorts: Vec<SortKey>,
    #[arg(long)]
    limit: Option<usize>,
    /// Id of the last range of the previous page
    #[arg(long)]
    marker: Option<Uuid>,
    #[arg(long)]
    page_reverse: bool,
}

impl ListArgs {
    fn filters(&self) -> RangeFilters {
        RangeFilters {
            name: self.name.clone(),
            network_type: self.network_type,
            physical_network: self.physical_network.clone(),
            project_id: self.project_id.clone(),
            shared: self.shared,
            default: self.default,
        }
    }

    fn pager(&self) -> Pager {
        Pager {
            sorts: self.sorts.clone(),
            limit: self.limit,
            marker: self.marker,
            page_reverse: self.page_reverse,
        }
    }
}

#[derive(ClapArgs, Debug)]
struct CreateArgs {
    #[arg(long)]
    network_type: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    shared: bool,
    #[arg(long)]
    project_id: Option<String>,
    #[arg(long)]
    physical_network: Option<String>,
    #[arg(long)]
    minimum: SegmentationId,
    #[arg(long)]
    maximum: SegmentationId,
}

impl From<CreateArgs> for CreateRange {
    fn from(args: CreateArgs) -> Self {
        CreateRange {
            name: args.name,
            shared: args.shared,
            project_id: args.project_id,
            network_type: args.network_type,
            physical_network: args.physical_network,
            minimum: args.minimum,
            maximum: args.maximum,
        }
    }
}

#[derive(ClapArgs, Debug)]
struct UpdateArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    shared: Option<bool>,
    #[arg(long)]
    project_id: Option<String>,
    #[arg(long)]
    minimum: Option<SegmentationId>,
    #[arg(long)]
    maximum: Option<SegmentationId>,
}

impl From<UpdateArgs> for UpdateRange {
    fn from(args: UpdateArgs) -> Self {
        UpdateRange {
            name: args.name,
            shared: args.shared,
            project_id: args.project_id,
            minimum: args.minimum,
            maximum: args.maximum,
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).wrap_err("Failed to serialize output")
}

fn run(command: Command, service: &RangeService, manager: &SegmentTypeManager) -> Result<String> {
    match command {
        Command::Init => {
            manager.initialize_network_segment_range_support()?;
            let defaults = RangeFilters {
                default: Some(true),
                ..Default::default()
            };
            to_json(&service.list(&defaults, &Pager::default())?)
        }
        Command::List(list) => to_json(&service.list(&list.filters(), &list.pager())?),
        Command::Show { id } => to_json(&service.get(id)?),
        Command::Create(create) => to_json(&service.create(&create.into())?),
        Command::Update { id, changes } => to_json(&service.update(id, &changes.into())?),
        Command::Delete { id } => {
            service.delete(id)?;
            to_json(&serde_json::json!({ "deleted": id }))
        }
        Command::Allocate {
            network_type,
            physical_network,
            project_id,
        } => to_json(&manager.allocate_segment(network_type, physical_network.as_deref(), &project_id)?),
        Command::Reserve {
            network_type,
            physical_network,
            segmentation_id,
            project_id,
        } => to_json(&manager.reserve_segment(
            network_type,
            physical_network.as_deref(),
            segmentation_id,
            &project_id,
        )?),
        Command::Release { segment_id } => to_json(&manager.release_segment(segment_id)?),
    }
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse command-line arguments
    let args = Args::parse();

    let config = config_loader::load_config_or_default(&args.config)?;

    // Initialize logging with the configured default filter
    let default_filter = config.general.log_level.clone().unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    let state_path = args
        .state
        .clone()
        .or_else(|| config.general.state_file.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("segrange_state.json"));
    info!("Configuration file: {:?}", args.config);
    info!("State file: {:?}", state_path);

    let db = Arc::new(
        Datastore::load(&state_path)
            .wrap_err_with(|| format!("Failed to load state file '{}'", state_path.display()))?,
    );
    let manager = Arc::new(
        SegmentTypeManager::new(db.clone(), &config).wrap_err("Failed to set up network type manager")?,
    );
    let service = RangeService::new(db.clone(), RangeRepository::default(), manager.clone());

    let mutation = args.command.is_mutation();
    let output = run(args.command, &service, &manager)?;
    println!("{}", output);

    if mutation {
        db.save(&state_path)
            .wrap_err_with(|| format!("Failed to save state file '{}'", state_path.display()))?;
        info!("Saved state to {:?}", state_path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use segment_ranges::store::SortField;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(["segrange", "show", "6f1c1a52-4d36-4d3c-9c55-1b3f5f2f7a10"]);

        assert_eq!(args.config, PathBuf::from("segrange.yaml"));
        assert_eq!(args.state, None);
        assert!(matches!(args.command, Command::Show { .. }));
        assert!(!args.command.is_mutation());
    }

    #[test]
    fn test_list_args() {
        let args = Args::parse_from([
            "segrange",
            "--state",
            "/tmp/state.json",
            "list",
            "--network-type",
            "vlan",
            "--shared",
            "false",
            "--sort",
            "minimum:desc",
            "--sort",
            "name",
            "--limit",
            "2",
            "--page-reverse",
        ]);

        assert_eq!(args.state, Some(PathBuf::from("/tmp/state.json")));
        let Command::List(list) = args.command else {
            panic!("expected list command");
        };
        let filters = list.filters();
        assert_eq!(filters.network_type, Some(NetworkType::Vlan));
        assert_eq!(filters.shared, Some(false));
        let pager = list.pager();
        assert_eq!(pager.limit, Some(2));
        assert!(pager.page_reverse);
        assert_eq!(
            pager.sorts,
            vec![
                SortKey {
                    field: SortField::Minimum,
                    ascending: false,
                },
                SortKey {
                    field: SortField::Name,
                    ascending: true,
                },
            ]
        );
    }

    #[test]
    fn test_create_args_default_to_shared() {
        let args = Args::parse_from([
            "segrange",
            "create",
            "--network-type",
            "mpls",
            "--minimum",
            "10",
            "--maximum",
            "20",
        ]);

        assert!(args.command.is_mutation());
        let Command::Create(create) = args.command else {
            panic!("expected create command");
        };
        let request = CreateRange::from(create);
        assert!(request.shared);
        assert_eq!(request.network_type, "mpls");
        assert_eq!((request.minimum, request.maximum), (10, 20));
    }

    #[test]
    fn test_reserve_rejects_unknown_network_type() {
        let result = Args::try_parse_from([
            "segrange",
            "reserve",
            "--network-type",
            "mpls",
            "--segmentation-id",
            "5",
            "--project-id",
            "p1",
        ]);
        assert!(result.is_err());
    }
}
