//! Benchmarks for the least-squares solver.
use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use faer::MatMut;
use lsq_faer::{
    ArmijoBacktracking, Control, ErrorTerm, FnTerm, LevenbergMarquardt, SolveCfg, solve,
    solve_with,
};

fn solve_circle_line(c: &mut Criterion) {
    let circle = FnTerm::new(
        1,
        |x: &[f64], out: &mut [f64]| out[0] = x[0] * x[0] + x[1] * x[1] - 1.0,
        |x: &[f64], mut jac: MatMut<'_, f64>| {
            jac[(0, 0)] = 2.0 * x[0];
            jac[(0, 1)] = 2.0 * x[1];
        },
    );
    let line = FnTerm::new(
        1,
        |x: &[f64], out: &mut [f64]| out[0] = x[0] - x[1],
        |_x: &[f64], mut jac: MatMut<'_, f64>| {
            jac[(0, 0)] = 1.0;
            jac[(0, 1)] = -1.0;
        },
    );

    c.bench_function("solve_circle_line", |b| {
        b.iter(|| {
            let terms: [&dyn ErrorTerm<f64>; 2] = [&circle, &line];
            black_box(solve(&terms, vec![0.5, 0.5], SolveCfg::default()).unwrap())
        });
    });
}

fn fit_exponential_decay(c: &mut Criterion) {
    // y = p0 * exp(p1 * t) sampled on a small grid.
    let samples: Vec<(f64, f64)> = (0..20)
        .map(|i| {
            let t = f64::from(i) * 0.25;
            (t, 2.0 * (-0.7 * t).exp())
        })
        .collect();
    let n = samples.len();

    let data = samples.clone();
    let term = FnTerm::new(
        n,
        move |x: &[f64], out: &mut [f64]| {
            for (i, &(t, y)) in data.iter().enumerate() {
                out[i] = x[0] * (x[1] * t).exp() - y;
            }
        },
        {
            let data = samples.clone();
            move |x: &[f64], mut jac: MatMut<'_, f64>| {
                for (i, &(t, _)) in data.iter().enumerate() {
                    let e = (x[1] * t).exp();
                    jac[(i, 0)] = e;
                    jac[(i, 1)] = x[0] * t * e;
                }
            }
        },
    );

    c.bench_function("fit_exponential_decay", |b| {
        b.iter(|| {
            let terms: [&dyn ErrorTerm<f64>; 1] = [&term];
            let mut method = LevenbergMarquardt::<f64>::default();
            let refiner = ArmijoBacktracking::default();
            black_box(
                solve_with(
                    &terms,
                    vec![1.0, -0.1],
                    &mut method,
                    &refiner,
                    SolveCfg::default(),
                    |_| Control::Continue,
                )
                .unwrap(),
            )
        });
    });
}

criterion_group!(benches, solve_circle_line, fit_exponential_decay);
criterion_main!(benches);
