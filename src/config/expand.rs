// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
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

//! `${VAR}` expansion for configuration file values.

/// Expand `${VAR}` references in `input` using `lookup`.
///
/// Unknown variables and unterminated references are left unchanged, so a
/// PIN that happens to contain `${` survives untouched.
///
/// # Examples
///
/// ```
/// use printer_cert_renew::config::expand_variables;
///
/// let lookup = |name: &str| (name == "SITE").then(|| "lab".to_string());
/// assert_eq!(expand_variables("printer.${SITE}.example.com", &lookup), "printer.lab.example.com");
/// assert_eq!(expand_variables("${MISSING}", &lookup), "${MISSING}");
/// ```
pub fn expand_variables<F>(input: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = input.to_string();
    let mut start = 0;

    while let Some(var_start) = result[start..].find("${") {
        let absolute_start = start + var_start;

        if let Some(var_end) = result[absolute_start..].find('}') {
            let absolute_end = absolute_start + var_end;
            let var_name = &result[absolute_start + 2..absolute_end];

            if let Some(value) = lookup(var_name) {
                result.replace_range(absolute_start..absolute_end + 1, &value);
                // Values are not re-expanded.
                start = absolute_start + value.len();
            } else {
                start = absolute_end + 1;
            }
        } else {
            start = absolute_start + 2;
        }
    }

    result
}
