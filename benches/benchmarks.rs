use criterion::{black_box, criterion_group, criterion_main, Criterion, SamplingMode};
use magic_chess::board::Board;
use magic_chess::evaluate::evaluate;
use magic_chess::movegen::{generate_captures, generate_moves};
use magic_chess::perft::perft;
use magic_chess::search::search_depth;

const KIWIPETE_FEN: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

pub fn bench_legal_moves_from_start(c: &mut Criterion) {
    let bo = Board::new();
    c.bench_function("legal moves from start", |b| {
        b.iter(|| generate_moves(black_box(&bo)))
    });
}

pub fn bench_legal_moves_from_kiwipete(c: &mut Criterion) {
    let bo = Board::from_fen(KIWIPETE_FEN).unwrap();
    c.bench_function("legal moves from kiwipete", |b| {
        b.iter(|| generate_moves(black_box(&bo)))
    });
    c.bench_function("captures from kiwipete", |b| {
        b.iter(|| generate_captures(black_box(&bo)))
    });
}

pub fn bench_make_move(c: &mut Criterion) {
    let bo = Board::from_fen(KIWIPETE_FEN).unwrap();
    let moves = generate_moves(&bo);
    c.bench_function("make and restore every kiwipete move", |b| {
        b.iter(|| {
            let mut board = bo;
            for m in &moves {
                let saved = board;
                board.make_move(black_box(m));
                board = saved;
            }
            board
        })
    });
}

pub fn bench_perft_3_kiwipete(c: &mut Criterion) {
    let mut group = c.benchmark_group("flat-sampling");
    group.sample_size(10);
    group.sampling_mode(SamplingMode::Flat);
    let bo = Board::from_fen(KIWIPETE_FEN).unwrap();
    group.bench_function("perft 3 kiwipete", |b| {
        b.iter(|| perft(black_box(&bo), black_box(3)))
    });
    group.finish();
}

pub fn bench_evaluate_start(c: &mut Criterion) {
    let bo = Board::new();
    c.bench_function("evaluate start", |b| b.iter(|| evaluate(black_box(&bo))));
}

pub fn bench_evaluate_kiwipete(c: &mut Criterion) {
    let bo = Board::from_fen(KIWIPETE_FEN).unwrap();
    c.bench_function("evaluate kiwipete", |b| b.iter(|| evaluate(black_box(&bo))));
}

pub fn bench_search_4_kiwipete(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.sample_size(10);
    group.sampling_mode(SamplingMode::Flat);
    let bo = Board::from_fen(KIWIPETE_FEN).unwrap();
    group.bench_function("search kiwipete 4 ply", |b| {
        b.iter(|| search_depth(black_box(&bo), black_box(4), true))
    });
    group.bench_function("search kiwipete 4 ply no tt", |b| {
        b.iter(|| search_depth(black_box(&bo), black_box(4), false))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_legal_moves_from_start,
    bench_legal_moves_from_kiwipete,
    bench_make_move,
    bench_perft_3_kiwipete,
    bench_evaluate_start,
    bench_evaluate_kiwipete,
    bench_search_4_kiwipete,
);
criterion_main!(benches);
