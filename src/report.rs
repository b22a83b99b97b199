use crate::error::CheckError;
use crate::store::ResolvedImage;
use crate::version::{newer_versions, CompareMode};
use colored::*;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageNewerVersions {
    pub image_name: String,
    pub newer_versions: Vec<String>,
}

impl ImageNewerVersions {
    pub fn is_up_to_date(&self) -> bool {
        self.newer_versions.is_empty()
    }
}

/// One line of the final report.
#[derive(Debug)]
pub enum ImageReport {
    Checked(ImageNewerVersions),
    Failed { image_name: String, error: CheckError },
}

impl ImageReport {
    pub fn line(&self) -> String {
        match self {
            ImageReport::Checked(result) if result.is_up_to_date() => {
                format!("{} is up to date", result.image_name)
            }
            ImageReport::Checked(result) => format!(
                "There are new versions of {}! Newer versions: [{}]",
                result.image_name,
                result.newer_versions.join(", ")
            ),
            ImageReport::Failed { image_name, error } => format!(
                "Failed to check image {} for newer versions, {}",
                image_name, error
            ),
        }
    }

    pub fn print(&self) {
        match self {
            ImageReport::Checked(result) if result.is_up_to_date() => {
                println!("{} {}", "✓".green(), self.line());
            }
            ImageReport::Checked(_) => println!("{} {}", "⬆".yellow(), self.line().bold()),
            ImageReport::Failed { .. } => println!("{} {}", "✗".red(), self.line()),
        }
    }
}

/// Compares every resolved image with its registry tags, in resolution order.
pub fn check_images_for_newer_versions(resolved: &[ResolvedImage], mode: CompareMode) -> Vec<ImageReport> {
    resolved
        .iter()
        .map(|entry| {
            let image_name = entry.image.raw_name.clone();
            match newer_versions(&entry.image.tag, &entry.tags, mode) {
                Ok(newer_versions) => ImageReport::Checked(ImageNewerVersions {
                    image_name,
                    newer_versions,
                }),
                Err(error) => {
                    warn!(image = %image_name, error = %error, "failed to compare versions");
                    ImageReport::Failed { image_name, error }
                }
            }
        })
        .collect()
}

pub fn print_reports(reports: &[ImageReport]) {
    for report in reports {
        report.print();
    }
}
