use std::str::FromStr;
use std::time::Instant;

use bc_engine::prelude::*;
use graph_builder::prelude::*;
use log::info;

#[derive(Debug)]
enum FileFormat {
    EdgeList,
    Graph500,
}

impl FromStr for FileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "edgelist" => Ok(Self::EdgeList),
            "graph500" => Ok(Self::Graph500),
            _ => Err(format!("unsupported file format {s}")),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli::AppArgs {
        path,
        format,
        use_32_bit,
        runs,
        concurrency,
        epsilon,
    } = cli::create()?;

    info!(
        "Reading graph ({} bit) from: {:?}",
        if use_32_bit { "32" } else { "64" },
        path
    );

    let config = BetweennessConfig::new(epsilon);

    match (use_32_bit, format) {
        (true, FileFormat::EdgeList) => run::<u32, _, _>(path, EdgeListInput::default(), runs, concurrency, config),
        (true, FileFormat::Graph500) => run::<u32, _, _>(path, Graph500Input::default(), runs, concurrency, config),
        (false, FileFormat::EdgeList) => run::<usize, _, _>(path, EdgeListInput::default(), runs, concurrency, config),
        (false, FileFormat::Graph500) => {
            run::<usize, _, _>(path, Graph500Input::default(), runs, concurrency, config)
        }
    }
}

/// Every partition gets a `Cpu` worker and the `Random` virtual-warp
/// profile: this binary exists to exercise the engine end to end, not to
/// demonstrate a production partitioning/placement policy.
fn run<NI, Format, Path>(
    path: Path,
    file_format: Format,
    runs: usize,
    concurrency: usize,
    config: BetweennessConfig,
) -> Result<(), Box<dyn std::error::Error>>
where
    NI: Idx,
    Path: AsRef<std::path::Path>,
    Format: InputCapabilities<NI>,
    Format::GraphInput: TryFrom<InputPath<Path>>,
    <Format::GraphInput as TryFrom<InputPath<Path>>>::Error: std::error::Error + 'static,
    UndirectedCsrGraph<NI>: TryFrom<(Format::GraphInput, CsrLayout)>,
    <UndirectedCsrGraph<NI> as TryFrom<(Format::GraphInput, CsrLayout)>>::Error: std::error::Error + 'static,
{
    let graph: UndirectedCsrGraph<NI> = GraphBuilder::new()
        .csr_layout(CsrLayout::Sorted)
        .file_format(file_format)
        .path(path)
        .build()?;

    let partitioned = partition_by_range(&graph, concurrency, |_| PartitionKind::Cpu, |_| PartitionAlgorithm::Random);

    info!(
        "Partitioned {} nodes into {} partitions.",
        partitioned.total_node_count,
        partitioned.partition_count()
    );

    for run in 1..=runs {
        let start = Instant::now();
        let scores = betweenness_hybrid(&partitioned, &config)?;
        info!("Run {} of {} finished in {:.6?}", run, runs, start.elapsed());

        let top = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).expect("betweenness scores are never NaN"))
            .expect("a non-empty graph has at least one score");
        info!("Highest betweenness: node {} with score {:.4}", top.0, top.1);
    }

    Ok(())
}

mod cli {
    use pico_args::Arguments;

    #[derive(Debug)]
    pub(crate) struct AppArgs {
        pub(crate) path: std::path::PathBuf,
        pub(crate) format: crate::FileFormat,
        pub(crate) runs: usize,
        pub(crate) use_32_bit: bool,
        pub(crate) concurrency: usize,
        pub(crate) epsilon: f32,
    }

    pub(crate) fn create() -> Result<AppArgs, Box<dyn std::error::Error>> {
        let mut pargs = Arguments::from_env();

        fn as_path_buf(arg: &std::ffi::OsStr) -> Result<std::path::PathBuf, std::convert::Infallible> {
            Ok(arg.into())
        }

        let default_config = bc_engine::prelude::BetweennessConfig::default();

        let args = AppArgs {
            path: pargs.value_from_os_str(["-p", "--path"], as_path_buf)?,
            format: pargs
                .opt_value_from_str(["-f", "--format"])?
                .unwrap_or(crate::FileFormat::EdgeList),
            runs: pargs.opt_value_from_str(["-r", "--runs"])?.unwrap_or(1),
            use_32_bit: pargs.contains("--use-32-bit"),
            concurrency: pargs
                .opt_value_from_str("--concurrency")?
                .unwrap_or_else(num_cpus::get),
            epsilon: pargs
                .opt_value_from_str("--epsilon")?
                .unwrap_or(default_config.epsilon),
        };

        Ok(args)
    }
}
