use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use filament_jackknife::jackknife::{GridAxes, RegionPolicy};
use filament_jackknife::parse::ascii;
use filament_jackknife::{
    AnalysisOptions, DistanceIndex, DistanceOptions, FilamentAnalysis, FilamentSpine,
    JackknifeOptions, Point3, RecordStatistic,
};

const USAGE: &str = r"filament_cli (filament-jackknife)

USAGE:
  filament_cli map <tracers> --filament <path>... [options]
  filament_cli jackknife <tracers> --filament <path>... --regions <K> [options]

Point files hold one `x y z` triple per line; `#` starts a comment.

OPTIONS (map):
  --filament <path>      Filament spine vertices, in order (repeatable)
  --max-distance <d>     Initial search radius in Mpc
  --no-prune             Scan every segment instead of using the hierarchy
  --out <path>           Write the record table here instead of stdout

OPTIONS (jackknife):
  --filament <path>      As above (repeatable)
  --regions <K>          Number of jackknife regions (>= 2)
  --policy <name>        grid-xy | grid-xz | grid-yz | octants | random (default grid-xy)
  --seed <n>             Seed for the random policy (default 0)
  --statistic <name>     mean-distance | median-distance | mean-position |
                         median-position | fraction-within:<r> (repeatable,
                         default mean-distance)
  --max-distance <d>     As for map
  --no-prune             As for map
  --json                 Print the full report as JSON
  -h, --help             Show this help
";

fn main() {
    if let Err(err) = run() {
        eprintln!("filament_cli error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut args = Args::new(args);

    let Some(command) = args.next() else {
        print_usage();
        return Ok(());
    };

    match command.as_str() {
        "map" => cmd_map(&mut args),
        "jackknife" => cmd_jackknife(&mut args),
        "-h" | "--help" | "help" => {
            print_usage();
            Ok(())
        }
        other => Err(format!("unknown command `{other}`\n\n{USAGE}")),
    }
}

fn print_usage() {
    println!("{USAGE}");
}

#[derive(Debug, Default)]
struct Inputs {
    tracers: Option<PathBuf>,
    filaments: Vec<PathBuf>,
    distance: DistanceOptions,
}

impl Inputs {
    /// Consumes one argument shared by both commands; `Ok(false)` if it is
    /// not one of them.
    fn accept(&mut self, arg: &str, args: &mut Args) -> Result<bool, String> {
        match arg {
            "--filament" => self.filaments.push(PathBuf::from(args.value("--filament")?)),
            "--max-distance" => {
                let raw = args.value("--max-distance")?;
                let d: f64 = raw
                    .parse()
                    .map_err(|e| format!("invalid --max-distance `{raw}`: {e}"))?;
                self.distance.max_distance = Some(d);
            }
            "--no-prune" => self.distance.prune = false,
            positional if !positional.starts_with('-') && self.tracers.is_none() => {
                self.tracers = Some(PathBuf::from(positional));
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn load(&self) -> Result<(Vec<Point3>, Vec<FilamentSpine>), String> {
        let tracer_path = self.tracers.as_ref().ok_or("missing tracer file")?;
        if self.filaments.is_empty() {
            return Err("at least one --filament is required".to_owned());
        }
        let tracers = ascii::load_points(tracer_path)
            .map_err(|e| format!("{}: {e}", tracer_path.display()))?;
        let spines = self
            .filaments
            .iter()
            .map(|path| ascii::load_polyline(path).map_err(|e| format!("{}: {e}", path.display())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((tracers, spines))
    }
}

fn cmd_map(args: &mut Args) -> Result<(), String> {
    let mut inputs = Inputs::default();
    let mut out_path: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        if inputs.accept(&arg, args)? {
            continue;
        }
        match arg.as_str() {
            "--out" => out_path = Some(PathBuf::from(args.value("--out")?)),
            "-h" | "--help" => {
                print_usage();
                return Ok(());
            }
            other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
        }
    }

    let (tracers, spines) = inputs.load()?;
    let index = DistanceIndex::build(spines, inputs.distance).map_err(|e| e.to_string())?;
    let (records, diagnostics) = index
        .compute_all_with_diagnostics(&tracers)
        .map_err(|e| e.to_string())?;
    for warning in &diagnostics.warnings {
        eprintln!("warning: {warning}");
    }

    match out_path {
        Some(path) => {
            let file = File::create(&path).map_err(|e| format!("{}: {e}", path.display()))?;
            ascii::write_records(BufWriter::new(file), &records).map_err(|e| e.to_string())?;
            eprintln!("wrote {} records to {}", records.len(), path.display());
        }
        None => {
            ascii::write_records(io::stdout().lock(), &records).map_err(|e| e.to_string())?;
        }
    }
    eprintln!("{}", diagnostics.summary());
    Ok(())
}

fn cmd_jackknife(args: &mut Args) -> Result<(), String> {
    let mut inputs = Inputs::default();
    let mut region_count: Option<usize> = None;
    let mut policy = RegionPolicy::Grid {
        axes: GridAxes::default(),
    };
    let mut seed: u64 = 0;
    let mut statistics: Vec<RecordStatistic> = Vec::new();
    let mut json = false;

    while let Some(arg) = args.next() {
        if inputs.accept(&arg, args)? {
            continue;
        }
        match arg.as_str() {
            "--regions" => {
                let raw = args.value("--regions")?;
                region_count = Some(
                    raw.parse()
                        .map_err(|e| format!("invalid --regions `{raw}`: {e}"))?,
                );
            }
            "--policy" => policy = args.value("--policy")?.parse()?,
            "--seed" => {
                let raw = args.value("--seed")?;
                seed = raw.parse().map_err(|e| format!("invalid --seed `{raw}`: {e}"))?;
            }
            "--statistic" => statistics.push(args.value("--statistic")?.parse()?),
            "--json" => json = true,
            "-h" | "--help" => {
                print_usage();
                return Ok(());
            }
            other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
        }
    }

    let region_count = region_count.ok_or("missing --regions")?;
    if let RegionPolicy::Random { seed: s } = &mut policy {
        *s = seed;
    }
    if statistics.is_empty() {
        statistics.push(RecordStatistic::MeanDistance);
    }

    let (tracers, spines) = inputs.load()?;
    let options = AnalysisOptions {
        distance: inputs.distance,
        jackknife: JackknifeOptions {
            region_count,
            policy,
        },
    };
    let analysis = FilamentAnalysis::new(spines, options).map_err(|e| e.to_string())?;
    let report = analysis
        .run(&tracers, &statistics)
        .map_err(|e| e.to_string())?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &report).map_err(|e| e.to_string())?;
        writeln!(out).map_err(|e| e.to_string())?;
    } else {
        for warning in &report.diagnostics.warnings {
            eprintln!("warning: {warning}");
        }
        writeln!(
            out,
            "{} tracers, {} regions (sizes {:?})",
            report.records.len(),
            report.region_count,
            report
                .statistics
                .first()
                .map(|s| s.result.region_sizes.clone())
                .unwrap_or_default()
        )
        .map_err(|e| e.to_string())?;
        for stat in &report.statistics {
            writeln!(
                out,
                "{:<24} {:.6}  (jackknife mean {:.6}, bias-corrected {:.6})",
                stat.name,
                stat.result,
                stat.result.jackknife_mean,
                stat.result.bias_corrected()
            )
            .map_err(|e| e.to_string())?;
        }
    }
    Ok(())
}

struct Args {
    args: Vec<String>,
    pos: usize,
}

impl Args {
    fn new(args: Vec<String>) -> Self {
        Self { args, pos: 0 }
    }

    fn next(&mut self) -> Option<String> {
        let arg = self.args.get(self.pos)?.clone();
        self.pos += 1;
        Some(arg)
    }

    fn value(&mut self, flag: &str) -> Result<String, String> {
        self.next().ok_or_else(|| format!("missing value for {flag}"))
    }
}
