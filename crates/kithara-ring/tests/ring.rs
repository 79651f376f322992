//! Integration tests for `RingBuffer`: wraparound order and cursor invariants.

use kithara_ring::RingBuffer;
use kithara_test_utils::Xorshift64;
use rstest::rstest;

fn assert_invariants(r: &RingBuffer<u8>) {
    assert_eq!(r.len() + r.space(), r.capacity() - 1);
    assert!(r.len() < r.capacity());
    assert_eq!(r.is_full(), r.space() == 0);
    assert_eq!(r.is_empty(), r.len() == 0);
    if r.capacity() > 1 {
        assert!(!(r.is_full() && r.is_empty()));
    }
}

#[test]
fn wraparound_preserves_order() {
    let mut r = RingBuffer::new(vec![0u8; 8].into_boxed_slice());

    assert_eq!(r.write_from(b"ABCDEFG"), 7);
    assert_eq!(r.len(), 7);
    assert!(r.is_full());

    let mut head = [0u8; 3];
    assert_eq!(r.read_into(&mut head), 3);
    assert_eq!(&head, b"ABC");
    assert_eq!(r.len(), 4);

    // crosses the end of the backing array
    assert_eq!(r.write_from(b"HI"), 2);

    let mut rest = [0u8; 6];
    assert_eq!(r.read_into(&mut rest), 6);
    assert_eq!(&rest, b"DEFGHI");
    assert!(r.is_empty());
}

#[test]
fn manual_two_phase_write_after_wrap() {
    let mut r = RingBuffer::new(vec![0u8; 8].into_boxed_slice());
    r.write_from(b"ABCDEFG");
    r.consume(5);

    let first = r.prepare_write();
    assert_eq!(first.len(), 1);
    first[0] = b'X';
    r.commit_write(1);

    let second = r.prepare_write();
    assert_eq!(second.len(), 4);
    second[..4].copy_from_slice(b"YZ12");
    r.commit_write(4);
    assert!(r.is_full());

    let mut out = [0u8; 7];
    assert_eq!(r.read_into(&mut out), 7);
    assert_eq!(&out, b"FGXYZ12");
}

#[rstest]
#[case(2, 1)]
#[case(3, 7)]
#[case(8, 42)]
#[case(64, 0xDEAD_BEEF)]
#[case(1021, 99)]
fn random_operations_keep_invariants_and_order(#[case] capacity: usize, #[case] seed: u64) {
    let mut rng = Xorshift64::new(seed);
    let mut r = RingBuffer::new(vec![0u8; capacity].into_boxed_slice());

    let mut next_in: u8 = 0;
    let mut next_out: u8 = 0;

    for _ in 0..2_000 {
        if rng.one_in(2) {
            let span = r.prepare_write();
            let n = rng.range_usize(0, span.len() + 1);
            for cell in &mut span[..n] {
                *cell = next_in;
                next_in = next_in.wrapping_add(1);
            }
            r.commit_write(n);
        } else {
            let span = r.prepare_read();
            let n = rng.range_usize(0, span.len() + 1);
            for &b in &span[..n] {
                assert_eq!(b, next_out);
                next_out = next_out.wrapping_add(1);
            }
            r.consume(n);
        }
        assert_invariants(&r);
    }

    // drain whatever is left; order must still hold
    let mut out = vec![0u8; r.len()];
    r.read_into(&mut out);
    for b in out {
        assert_eq!(b, next_out);
        next_out = next_out.wrapping_add(1);
    }
    assert_eq!(next_in, next_out);
    assert!(r.is_empty());
}

#[rstest]
#[case(5)]
#[case(16)]
fn fill_drain_cycles_round_trip(#[case] capacity: usize) {
    let mut r = RingBuffer::new(vec![0u8; capacity].into_boxed_slice());
    let usable = capacity - 1;

    for round in 0..(capacity * 3) {
        let chunk: Vec<u8> = (0..usable).map(|i| (i + round) as u8).collect();
        // offset the cursors by one every round so wraparound moves around
        r.write_from(&[0xFF]);
        r.consume(1);

        assert_eq!(r.write_from(&chunk), usable);
        assert!(r.is_full());
        let mut out = vec![0u8; usable];
        assert_eq!(r.read_into(&mut out), usable);
        assert_eq!(out, chunk);
        assert_invariants(&r);
    }
}
