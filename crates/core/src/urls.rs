/// Root of the player's local web interface; the presence button points here.
pub fn web_interface_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}/")
}

/// Status variables page polled each cycle.
pub fn variables_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}/variables.html")
}

#[cfg(test)]
mod tests {
    use super::{variables_url, web_interface_url};

    #[test]
    fn url_builders_embed_the_port() {
        assert_eq!(web_interface_url(13579), "http://127.0.0.1:13579/");
        assert_eq!(
            variables_url(13579),
            "http://127.0.0.1:13579/variables.html"
        );
    }
}
