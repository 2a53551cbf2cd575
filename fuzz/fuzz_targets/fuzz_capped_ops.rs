#![no_main]
use cartridge_capped::core::extent::EXTENT_HEADER_LEN;
use cartridge_capped::core::record::{record_len_for, MIN_DELETED_LEN};
use cartridge_capped::{CappedCollection, CappedConfig, CappedError};
use libfuzzer_sys::{fuzz_target, arbitrary::{Arbitrary, Unstructured}};

#[derive(Debug, Arbitrary)]
enum Op {
    Insert { len: u16, fill: u8 },
    Compact,
    CheckMigrate,
}

#[derive(Debug, Arbitrary)]
struct Layout {
    extent_words: Vec<u16>,
    max_records: Option<u8>,
}

// Random insert sequences against random rings; live records must always be
// the newest successful inserts in order
fuzz_target!(|input: &[u8]| {
    let mut u = Unstructured::new(input);

    let layout: Layout = match u.arbitrary() {
        Ok(l) => l,
        Err(_) => return,
    };
    let ops: Vec<Op> = match u.arbitrary() {
        Ok(ops) => ops,
        Err(_) => return,
    };

    let sizes: Vec<u32> = layout
        .extent_words
        .iter()
        .take(8)
        .map(|w| 200 + (*w as u32 % 4096) * 4)
        .collect();
    let largest_body = sizes.iter().map(|s| s - EXTENT_HEADER_LEN).max().unwrap_or(0) as u64;
    let mut config = match CappedConfig::new("fuzz.capped", sizes) {
        Ok(c) => c,
        Err(_) => return,
    };
    config.max_records = layout.max_records.map(|m| m as u64 + 1);
    let max = config.max_records;

    let coll = match CappedCollection::create(config) {
        Ok(c) => c,
        Err(_) => return,
    };
    let mut w = coll.write();
    let mut inserted: Vec<Vec<u8>> = Vec::new();

    for op in ops.iter().take(200) {
        match op {
            Op::Insert { len, fill } => {
                let payload = vec![*fill; *len as usize % 2048];
                match w.insert(&payload) {
                    Ok(Some(_)) => inserted.push(payload),
                    Ok(None) => {
                        let needed = record_len_for(payload.len()) + MIN_DELETED_LEN as u64;
                        assert!(
                            needed > largest_body,
                            "{} bytes fit an extent body of {} but found no room",
                            payload.len(),
                            largest_body
                        );
                    }
                    Err(CappedError::ZeroLength) => unreachable!("record headers make every request non-empty"),
                    Err(e) => panic!("insert of {} bytes failed: {}", payload.len(), e),
                }
            }
            Op::Compact => {
                w.compact().unwrap();
            }
            Op::CheckMigrate => assert!(!w.check_migrate().unwrap()),
        }

        let live = w.records().unwrap();
        assert!(live.len() <= inserted.len());
        assert_eq!(live[..], inserted[inserted.len() - live.len()..]);
        if let Some(max) = max {
            assert!(live.len() as u64 <= max);
        }

        let slots = w.free_slots().unwrap();
        let cap = w.state().details().cap_extent();
        for a in slots.iter().filter(|s| Some(s.extent()) == cap) {
            for b in slots.iter().filter(|s| Some(s.extent()) == cap) {
                assert!(!a.is_adjacent_to(b));
            }
        }
    }
});
