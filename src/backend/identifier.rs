//! The whole-file identifier backend: an in-process classifier built on
//! `askalono`, seeded with a small set of canonical license texts rather
//! than the full SPDX corpus.
//!
//! Maps into a single best-match `Result` with confidence equal to the
//! classifier's score and a `More` list of lower-ranked alternatives
//! (bounded to the runner-up). When no candidate clears the confidence
//! threshold, returns the distinguished `ErrUnknownLicense` sentinel
//! rather than a resource error.

use askalono::{ScanStrategy, Store, TextData};

use crate::error::{ScanError, ScanResult};
use crate::iterator::{Info, ScanContext};
use crate::license::License;
use crate::result::BackendResult;
use crate::safepath::SafePath;

use super::Backend;

const CONFIDENCE_THRESHOLD: f32 = 0.8;

/// (name, canonical text). A handful of short, representative license
/// bodies — enough to demonstrate whole-file classification without
/// embedding the full SPDX license-list-data file.
const CANONICAL_TEXTS: &[(&str, &str)] = &[
    (
        "MIT",
        "Permission is hereby granted, free of charge, to any person obtaining a copy \
         of this software and associated documentation files (the \"Software\"), to deal \
         in the Software without restriction, including without limitation the rights \
         to use, copy, modify, merge, publish, distribute, sublicense, and/or sell \
         copies of the Software, and to permit persons to whom the Software is \
         furnished to do so, subject to the following conditions:\n\n\
         The above copyright notice and this permission notice shall be included in all \
         copies or substantial portions of the Software.\n\n\
         THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR \
         IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, \
         FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.",
    ),
    (
        "Apache-2.0",
        "Licensed under the Apache License, Version 2.0 (the \"License\"); \
         you may not use this file except in compliance with the License. \
         You may obtain a copy of the License at\n\n\
         http://www.apache.org/licenses/LICENSE-2.0\n\n\
         Unless required by applicable law or agreed to in writing, software \
         distributed under the License is distributed on an \"AS IS\" BASIS, \
         WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. \
         See the License for the specific language governing permissions and \
         limitations under the License.",
    ),
    (
        "BSD-3-Clause",
        "Redistribution and use in source and binary forms, with or without \
         modification, are permitted provided that the following conditions are met:\n\n\
         1. Redistributions of source code must retain the above copyright notice, \
         this list of conditions and the following disclaimer.\n\
         2. Redistributions in binary form must reproduce the above copyright notice, \
         this list of conditions and the following disclaimer in the documentation \
         and/or other materials provided with the distribution.\n\
         3. Neither the name of the copyright holder nor the names of its \
         contributors may be used to endorse or promote products derived from \
         this software without specific prior written permission.\n\n\
         THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS \"AS IS\" \
         AND ANY EXPRESS OR IMPLIED WARRANTIES ARE DISCLAIMED.",
    ),
    (
        "ISC",
        "Permission to use, copy, modify, and/or distribute this software for any \
         purpose with or without fee is hereby granted, provided that the above \
         copyright notice and this permission notice appear in all copies.\n\n\
         THE SOFTWARE IS PROVIDED \"AS IS\" AND THE AUTHOR DISCLAIMS ALL WARRANTIES \
         WITH REGARD TO THIS SOFTWARE INCLUDING ALL IMPLIED WARRANTIES OF \
         MERCHANTABILITY AND FITNESS.",
    ),
    (
        "MPL-2.0",
        "This Source Code Form is subject to the terms of the Mozilla Public \
         License, v. 2.0. If a copy of the MPL was not distributed with this \
         file, You can obtain one at http://mozilla.org/MPL/2.0/.",
    ),
];

fn build_store() -> Store {
    let mut store = Store::new();
    for (name, text) in CANONICAL_TEXTS {
        store.add_license((*name).to_string(), TextData::new(text));
    }
    store
}

pub struct IdentifierBackend {
    store: Store,
}

impl IdentifierBackend {
    pub fn new() -> Self {
        IdentifierBackend { store: build_store() }
    }
}

impl Default for IdentifierBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for IdentifierBackend {
    fn id(&self) -> &str {
        "identifier"
    }

    fn has_path(&self) -> bool {
        true
    }

    fn scan_path(&self, _ctx: &ScanContext, path: &SafePath, _info: &Info) -> ScanResult<Option<BackendResult>> {
        let contents = std::fs::read_to_string(path.as_path()).map_err(ScanError::Io)?;
        self.classify(&contents)
    }
}

impl IdentifierBackend {
    fn classify(&self, contents: &str) -> ScanResult<Option<BackendResult>> {
        let strategy = ScanStrategy::new(&self.store)
            .confidence_threshold(CONFIDENCE_THRESHOLD)
            .optimize(true);

        let text = TextData::new(contents);
        let scanned = strategy
            .scan(&text)
            .map_err(|e| ScanError::Resource(format!("identifier backend failed: {e}")))?;

        let best = match scanned.license {
            Some(l) => l,
            None => return Err(ScanError::UnknownLicense),
        };

        let license = to_license(best.name);
        let mut result = BackendResult::new(vec![license], scanned.score as f64);

        for alt in scanned.containing.iter().take(1) {
            if alt.license.name != best.name {
                result.more.push(BackendResult::new(
                    vec![to_license(alt.license.name)],
                    alt.score as f64,
                ));
            }
        }

        Ok(Some(result))
    }
}

fn to_license(name: &str) -> License {
    if crate::license::is_known_spdx(name) {
        License::spdx(name)
    } else {
        License::custom("identifier", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_mit_text() {
        let backend = IdentifierBackend::new();
        let result = backend.classify(CANONICAL_TEXTS[0].1).unwrap().unwrap();
        assert_eq!(result.licenses, vec![License::spdx("MIT")]);
        assert!(result.confidence > CONFIDENCE_THRESHOLD as f64);
    }

    #[test]
    fn unrelated_text_is_unknown_license() {
        let backend = IdentifierBackend::new();
        let err = backend.classify("the quick brown fox jumps over the lazy dog").unwrap_err();
        assert!(err.is_unknown_license());
    }
}
