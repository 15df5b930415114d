#![no_main]

use libfuzzer_sys::fuzz_target;
use sim_core::{run, CoreConfig, CoreState, Decoder, NoTrace};

fuzz_target!(|data: &[u8]| {
    let Some((&flags, text)) = data.split_first() else {
        return;
    };
    let text = String::from_utf8_lossy(text);
    let program: Vec<Vec<&str>> = text
        .lines()
        .map(|line| {
            line.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|token| !token.is_empty())
                .collect()
        })
        .collect();

    for tokens in &program {
        let _ = Decoder::decode(tokens, program.len());
    }

    let config = CoreConfig {
        memory_size: 1 << 12,
        cache_size: 256,
        flush_invalidates: flags & 1 != 0,
        step_limit: Some(4096),
        ..CoreConfig::default()
    };
    let Ok(mut core) = CoreState::new(config) else {
        return;
    };
    core.load_program(&program);
    let _ = run(&mut core, &mut NoTrace);
    assert!(core.is_halted());
    assert_eq!(core.register_values()[0], 0);
});
