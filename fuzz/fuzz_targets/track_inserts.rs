#![no_main]

use brook_audio::track::fuzz_track_inserts;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    fuzz_track_inserts(data);
});
