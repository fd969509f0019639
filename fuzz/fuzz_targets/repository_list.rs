#![no_main]

use allscan_core::config::RepositoryList;
use libfuzzer_sys::fuzz_target;

// 파싱에 성공한 항목은 검증과 선택자 해석에서 패닉이 없어야 합니다.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(list) = RepositoryList::parse(text) {
        for spec in &list.repositories {
            if spec.validate().is_ok() {
                let _ = spec.selector().label().len();
                let _ = spec.declared_tag_commit();
            }
        }
    }
});
