//! Controller response classification

use ndfc_client::ControllerResponse;

/// Kind of request a response belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    Attach,
    Deploy,
    Delete,
    Query,
}

/// Classify a controller response.
///
/// For writes the pair is `(fail, changed)`. For [`Action::Query`] it is
/// `(missing, not_ok)`: a 404 Not Found reports the object as missing, any
/// other non-200 or non-OK reply reports the read as failed.
pub fn handle_response(response: &ControllerResponse, action: Action) -> (bool, bool) {
    if action == Action::Query {
        let not_found = response.return_code == 404
            && (response.error_text() == "Not Found" || response.message() == "Not Found");
        if not_found {
            return (true, false);
        }
        if response.return_code != 200 || response.message() != "OK" {
            return (false, true);
        }
        return (false, false);
    }

    if action == Action::Attach && response.contains("is in use already") {
        return (true, false);
    }

    let mut fail = false;
    let mut changed = true;
    if action == Action::Deploy && response.data.as_str() == Some("No switches PENDING for deployment") {
        changed = false;
    }
    if !response.error_text().is_empty() {
        fail = true;
        changed = false;
    }
    if response.message() != "OK" || response.return_code != 200 {
        fail = true;
        changed = false;
    }
    (fail, changed)
}
