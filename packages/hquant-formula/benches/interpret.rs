use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hquant_formula::{Bar, Diagnostic, Engine, Flow, Quote};

const MACD: &str = "DIF:EMA(CLOSE,12)-EMA(CLOSE,26);\nDEA:EMA(DIF,9);\nMACD:(DIF-DEA)*2;";

const KDJ: &str = "N:=9; M1:=3; M2:=3;
RSV:=(CLOSE-LLV(LOW,N))/(HHV(HIGH,N)-LLV(LOW,N))*100;
K:SMA(RSV,M1,1);
D:SMA(K,M2,1);
J:3*K-2*D;";

fn bars(n: usize) -> Vec<Bar> {
    (0..n)
        .map(|i| {
            let c = 100.0 + (i as f64 * 0.1).sin() * 3.0;
            Bar::new(c, c + 0.5, c - 0.5, c)
        })
        .collect()
}

fn quiet(_: &Diagnostic) -> Flow {
    Flow::Continue
}

fn bench_bar_by_bar(c: &mut Criterion) {
    let engine = Engine::init();
    let mut group = c.benchmark_group("bar_by_bar");

    for (name, src) in [("macd", MACD), ("kdj", KDJ)] {
        for n in [250usize, 1000] {
            let data = bars(n);
            group.bench_with_input(BenchmarkId::new(name, n), &data, |b, data| {
                b.iter(|| {
                    let mut s = engine.create_session(quiet);
                    s.parse(src);
                    let mut q = Quote::with_capacity(data.len());
                    for bar in data {
                        q.push(*bar);
                        let _ = s.interpret(black_box(&q));
                    }
                    s.indicator("J").or(s.indicator("MACD"))
                });
            });
        }
    }

    group.finish();
}

fn bench_one_shot(c: &mut Criterion) {
    let engine = Engine::init();
    let quote = Quote::from_bars(bars(5000));

    c.bench_function("one_shot_macd_5000", |b| {
        b.iter(|| {
            let mut s = engine.create_session(quiet);
            s.parse(MACD);
            let _ = s.interpret(black_box(&quote));
            s.indicator("MACD")
        });
    });
}

fn bench_parse(c: &mut Criterion) {
    let engine = Engine::init();
    let src = format!("{MACD}\n{KDJ}");

    c.bench_function("parse_macd_kdj", |b| {
        b.iter(|| {
            let mut s = engine.create_session(quiet);
            s.parse(black_box(&src)).error_count
        });
    });
}

criterion_group!(benches, bench_bar_by_bar, bench_one_shot, bench_parse);
criterion_main!(benches);
