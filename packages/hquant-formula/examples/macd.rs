use hquant_formula::{Bar, Diagnostic, Engine, Flow, FormulaIndicator, SessionConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

// Run with `RUST_LOG=hquant_formula=debug` to see per-bar evaluation.

const FORMULA: &str = r#"
DIF:EMA(CLOSE,12)-EMA(CLOSE,26);
DEA:EMA(DIF,9);
MACD:(DIF-DEA)*2;
N:=9;
RSV:=(CLOSE-LLV(LOW,N))/(HHV(HIGH,N)-LLV(LOW,N))*100;
K:SMA(RSV,3,1);
"#;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let engine = Engine::init();
    let handler = |d: &Diagnostic| {
        eprintln!("{d}");
        Flow::Continue
    };
    let (mut ind, report) =
        FormulaIndicator::new(&engine, FORMULA, handler, SessionConfig::default())
            .expect("formula rejected");
    info!(errors = report.error_count, "formula compiled");

    for i in 0..200 {
        let close = 100.0 + (i as f64 * 0.15).sin() * 5.0 + i as f64 * 0.02;
        ind.push_bar(Bar::new(close - 0.2, close + 0.8, close - 0.9, close))
            .expect("interpret");
    }
    // A live feed keeps revising the newest bar until it closes.
    ind.update_last(Bar::new(103.0, 106.0, 102.5, 105.5))
        .expect("interpret");

    for (name, value) in ind.session().outputs() {
        let last = value.and_then(|v| v.last()).unwrap_or(f64::NAN);
        println!("{name}={last:.4}");
    }
    engine.shutdown();
}
