use super::state::StatusView;

/// Open status views, one per repository root, in tab order
#[derive(Default)]
pub struct StatusRegistry {
    views: Vec<StatusView>,
    active: usize,
}

impl StatusRegistry {
    /// Add a view, or switch to the existing one for the same repository.
    /// Returns whether a new view was added.
    pub fn open(&mut self, view: StatusView) -> bool {
        if let Some(i) = self.position(&view.repo_root) {
            self.active = i;
            return false;
        }
        self.views.push(view);
        self.active = self.views.len() - 1;
        true
    }

    fn position(&self, repo_root: &str) -> Option<usize> {
        self.views.iter().position(|v| v.repo_root == repo_root)
    }

    pub fn get(&self, repo_root: &str) -> Option<&StatusView> {
        self.views.iter().find(|v| v.repo_root == repo_root)
    }

    pub fn get_mut(&mut self, repo_root: &str) -> Option<&mut StatusView> {
        self.views.iter_mut().find(|v| v.repo_root == repo_root)
    }

    /// The active view. The registry is never empty once the app is running.
    pub fn active(&self) -> &StatusView {
        &self.views[self.active]
    }

    pub fn active_mut(&mut self) -> &mut StatusView {
        &mut self.views[self.active]
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatusView> {
        self.views.iter()
    }

    pub fn repo_roots(&self) -> Vec<String> {
        self.views.iter().map(|v| v.repo_root.clone()).collect()
    }

    /// Switch to the next tab (circular)
    pub fn next(&mut self) {
        if self.views.len() > 1 {
            self.active = (self.active + 1) % self.views.len();
        }
    }

    /// Switch to the previous tab (circular)
    pub fn prev(&mut self) {
        if self.views.len() > 1 {
            self.active = if self.active == 0 {
                self.views.len() - 1
            } else {
                self.active - 1
            };
        }
    }
}
