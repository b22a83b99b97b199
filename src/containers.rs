use anyhow::{anyhow, Context, Result};
use std::process;

/// An image to check, with the container it came from when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    pub image: String,
    pub container: Option<String>,
}

impl ImageSource {
    pub fn from_argument(image: &str) -> Self {
        Self {
            image: image.to_string(),
            container: None,
        }
    }
}

/// Lists the images of running containers through the docker CLI.
pub fn running_containers() -> Result<Vec<ImageSource>> {
    let output = process::Command::new("docker")
        .args(["ps", "--format", "{{.Image}}\t{{.Names}}"])
        .output()
        .context("failed to run docker, is it installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("docker ps failed: {}", stderr.trim()));
    }

    Ok(parse_ps_output(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_ps_output(stdout: &str) -> Vec<ImageSource> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let (image, names) = line.split_once('\t').unwrap_or((line, ""));
            // A container can carry several comma separated names.
            let container = names.split(',').next().filter(|n| !n.is_empty());
            ImageSource {
                image: image.to_string(),
                container: container.map(|n| n.trim_start_matches('/').to_string()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_docker_ps_lines() {
        let sources = parse_ps_output("nginx:1.25\tweb\nghcr.io/team/api:2.1\tapi,api-alias\n\nredis\t\n");
        assert_eq!(
            sources,
            vec![
                ImageSource {
                    image: "nginx:1.25".to_string(),
                    container: Some("web".to_string()),
                },
                ImageSource {
                    image: "ghcr.io/team/api:2.1".to_string(),
                    container: Some("api".to_string()),
                },
                ImageSource {
                    image: "redis".to_string(),
                    container: None,
                },
            ]
        );
    }
}
