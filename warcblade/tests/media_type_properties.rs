// Copyright 2025 Janek Bevendorff
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Property tests for media type normalization.

use proptest::prelude::*;
use warcblade::http::normalize_media_type;

proptest! {
    #[test]
    fn prop_normalize_is_idempotent(value in "[ -~]{0,60}") {
        if let Some(normalized) = normalize_media_type(&value) {
            prop_assert_eq!(normalize_media_type(&normalized), Some(normalized.clone()));
            prop_assert!(!normalized.contains(';'));
            prop_assert_eq!(normalized.to_ascii_lowercase(), normalized);
        }
    }

    #[test]
    fn prop_parameters_are_dropped(
        kind in "[a-zA-Z][a-zA-Z0-9.+-]{0,15}",
        subtype in "[a-zA-Z][a-zA-Z0-9.+-]{0,15}",
        params in "[ -~]{0,40}",
    ) {
        let value = format!("{kind}/{subtype}; {params}");
        let expected = format!("{kind}/{subtype}").to_ascii_lowercase();
        prop_assert_eq!(normalize_media_type(&value), Some(expected));
    }
}
