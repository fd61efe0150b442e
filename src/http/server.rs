use log::{debug, info};
use rouille::{Request, Response};
use std::path::{Path, PathBuf};

use crate::{config::HttpConfig, http::error::ApiError};

/// Serves the generated player, playlist, covers and audio files of one folder
pub struct StaticServer {
    root: PathBuf,
    index_page: String,
    pub config: HttpConfig,
}

impl StaticServer {
    pub fn new(root: PathBuf, index_page: String, config: HttpConfig) -> Self {
        Self {
            root,
            index_page,
            config,
        }
    }

    pub fn run(self) {
        let addr = format!("{}:{}", self.config.bind_addr, self.config.port);
        rouille::start_server(addr, move |request| self.handle_request(request));
    }

    fn handle_request(&self, request: &Request) -> Response {
        Self::log_request(request);

        let response = match request.method() {
            "GET" | "HEAD" => self
                .serve_file(&request.url())
                .unwrap_or_else(ApiError::into_response),
            _ => Response::text("method not allowed").with_status_code(405),
        };

        info!("Response: {} {}", request.method(), response.status_code);
        response
    }

    fn log_request(request: &Request) {
        info!("{} {}", request.method(), request.url());
    }

    /// Maps a decoded URL path to a file under the root.
    fn resolve(&self, url: &str) -> Result<PathBuf, ApiError> {
        let relative = url.trim_start_matches('/');
        let relative = if relative.is_empty() {
            self.index_page.as_str()
        } else {
            relative
        };

        let mut path = self.root.clone();
        for part in relative.split('/') {
            match part {
                "" | "." => continue,
                ".." => return Err(ApiError::BadRequest("path escapes the served folder".into())),
                // hidden files, including the extraction index next to the covers
                p if p.starts_with('.') => {
                    return Err(ApiError::NotFound(format!("{url} not found")));
                }
                p if p.contains(['\\', ':']) => {
                    return Err(ApiError::BadRequest(format!("invalid path segment '{p}'")));
                }
                p => path.push(p),
            }
        }
        Ok(path)
    }

    fn serve_file(&self, url: &str) -> Result<Response, ApiError> {
        let path = self.resolve(url)?;
        if !path.is_file() {
            return Err(ApiError::NotFound(format!("{url} not found")));
        }

        let file = std::fs::File::open(&path)?;
        let mime = Self::mime_for_path(&path);
        debug!("SERVE {} -> {}, MIME type: {}", url, path.display(), mime);

        Ok(Response::from_file(mime, file))
    }

    fn mime_for_path(path: &Path) -> String {
        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy())
            .map(|s| s.to_lowercase());
        let default = || {
            mime_guess::from_path(path)
                .first_or_octet_stream()
                .to_string()
        };
        ext.and_then(|ext| Self::mime_from_ext(ext.as_str()))
            .unwrap_or_else(default)
    }

    /// Map file extension (without dot) to the MIME type browsers expect.
    /// Returns None if the extension is not recognized.
    pub fn mime_from_ext(ext: &str) -> Option<String> {
        match ext {
            "m4a" => Some("audio/x-m4a".to_string()), // Safari iOS compatible
            "aac" => Some("audio/aac".to_string()),
            "mp3" => Some("audio/mpeg".to_string()),
            "wav" => Some("audio/wav".to_string()),
            "ogg" => Some("audio/ogg".to_string()),
            "js" => Some("text/javascript; charset=utf-8".to_string()),
            "html" => Some("text/html; charset=utf-8".to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rouille::Request;
    use std::{fs, io::Read};
    use tempfile::TempDir;

    fn parse_text_response(response: rouille::Response) -> String {
        let mut buf = String::new();
        let mut reader = response.data.into_reader_and_size().0;
        reader.read_to_string(&mut buf).unwrap();
        buf
    }

    fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
        response
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_ref())
    }

    fn create_server(root: &Path) -> StaticServer {
        StaticServer::new(
            root.to_path_buf(),
            "index.html".to_string(),
            HttpConfig::default(),
        )
    }

    fn get(server: &StaticServer, url: &str) -> Response {
        let request = Request::fake_http("GET", url, vec![], vec![]);
        server.handle_request(&request)
    }

    #[test]
    fn root_serves_player_page() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("index.html"), "<html>player</html>")?;

        let response = get(&create_server(dir.path()), "/");

        assert_eq!(response.status_code, 200);
        assert_eq!(header(&response, "Content-Type"), Some("text/html; charset=utf-8"));
        assert_eq!(parse_text_response(response), "<html>player</html>");
        Ok(())
    }

    #[test]
    fn serves_covers_and_audio() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        fs::create_dir_all(dir.path().join("covers"))?;
        fs::write(dir.path().join("covers/abc.png"), b"png")?;
        fs::write(dir.path().join("my song.mp3"), b"x")?;
        let server = create_server(dir.path());

        let cover = get(&server, "/covers/abc.png");
        assert_eq!(cover.status_code, 200);
        assert_eq!(header(&cover, "Content-Type"), Some("image/png"));

        let song = get(&server, "/my%20song.mp3");
        assert_eq!(song.status_code, 200);
        assert_eq!(header(&song, "Content-Type"), Some("audio/mpeg"));
        assert_eq!(parse_text_response(song), "x");
        Ok(())
    }

    #[test]
    fn missing_file_is_404() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let response = get(&create_server(dir.path()), "/nothing.mp3");
        assert_eq!(response.status_code, 404);
        Ok(())
    }

    #[test]
    fn directory_is_404() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        fs::create_dir_all(dir.path().join("covers"))?;
        let response = get(&create_server(dir.path()), "/covers");
        assert_eq!(response.status_code, 404);
        Ok(())
    }

    #[test]
    fn hidden_files_are_not_served() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        fs::create_dir_all(dir.path().join("covers"))?;
        fs::create_dir_all(dir.path().join(".config"))?;
        fs::write(dir.path().join("covers/.coverdeck-index.sqlite"), b"SQLite format 3\0")?;
        fs::write(dir.path().join(".config/settings.toml"), "port = 1")?;
        let server = create_server(dir.path());

        let index = get(&server, "/covers/.coverdeck-index.sqlite");
        assert_eq!(index.status_code, 404);
        assert!(!parse_text_response(index).contains("SQLite"));
        assert_eq!(get(&server, "/.config/settings.toml").status_code, 404);
        Ok(())
    }

    #[test]
    fn parent_traversal_is_rejected() -> anyhow::Result<()> {
        let outer = TempDir::new()?;
        let served = outer.path().join("music");
        fs::create_dir_all(&served)?;
        fs::write(outer.path().join("secret.txt"), "secret")?;

        let response = get(&create_server(&served), "/../secret.txt");

        assert_eq!(response.status_code, 400);
        assert!(!parse_text_response(response).contains("secret\n"));
        Ok(())
    }

    #[test]
    fn post_is_not_allowed() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let request = Request::fake_http("POST", "/", vec![], vec![]);
        let response = create_server(dir.path()).handle_request(&request);
        assert_eq!(response.status_code, 405);
        Ok(())
    }

    #[test]
    fn mime_overrides_for_playback() {
        assert_eq!(
            StaticServer::mime_from_ext("m4a"),
            Some("audio/x-m4a".to_string())
        );
        assert_eq!(StaticServer::mime_from_ext("png"), None);
        assert_eq!(
            StaticServer::mime_for_path(Path::new("covers/a.jpg")),
            "image/jpeg"
        );
    }
}
