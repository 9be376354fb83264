use cairn::codec::{decode_key, encode_key};
use cairn::{Key, Result, Slot};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use num_bigint::BigInt;

fn no_remotables(_: &Slot) -> Result<Option<String>> {
    Ok(None)
}

fn encode(key: &Key) -> String {
    encode_key(key, &mut no_remotables).unwrap().unwrap()
}

fn bench_encode(c: &mut Criterion) {
    let number = Key::Number(-1234.5678);
    let string = Key::Str("a moderately sized string key".into());
    let bigint = Key::BigInt("-123456789012345678901234567890".parse::<BigInt>().unwrap());

    c.bench_function("encode_number", |b| b.iter(|| encode(black_box(&number))));
    c.bench_function("encode_string", |b| b.iter(|| encode(black_box(&string))));
    c.bench_function("encode_bigint", |b| b.iter(|| encode(black_box(&bigint))));
}

fn bench_decode(c: &mut Criterion) {
    let number = encode(&Key::Number(-1234.5678));
    let bigint = encode(&Key::BigInt(
        "-123456789012345678901234567890".parse::<BigInt>().unwrap(),
    ));

    c.bench_function("decode_number", |b| {
        b.iter(|| decode_key(black_box(&number)).unwrap())
    });
    c.bench_function("decode_bigint", |b| {
        b.iter(|| decode_key(black_box(&bigint)).unwrap())
    });
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
