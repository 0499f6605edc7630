//! Project listing, creation, membership, and the locally remembered selection.

// self
use crate::{
	_prelude::*,
	gateway::Gateway,
	http::{ApiHttpClient, ApiRequest},
	tracker::Id,
};

/// Project as listed for the signed-in user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
	/// Project id.
	pub id: Id,
	/// Display name.
	pub name: String,
	/// Email of the project administrator.
	#[serde(default)]
	pub admin_email: String,
	/// Whether the signed-in user administers the project.
	#[serde(default)]
	pub is_admin: bool,
	/// Member emails.
	#[serde(default)]
	pub members: Vec<String>,
}

/// Body of a project creation call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreateProjectRequest {
	/// Display name.
	pub name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddMemberBody<'a> {
	member_email: &'a str,
}

impl<C> Gateway<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Lists the projects visible to the signed-in user.
	pub async fn list_projects(&self) -> Result<Vec<Project>> {
		self.call_json(ApiRequest::get(self.descriptor.projects()), "Failed to load projects").await
	}

	/// Creates a project.
	pub async fn create_project(&self, request: &CreateProjectRequest) -> Result<()> {
		let request = ApiRequest::post(self.descriptor.projects()).json(request)?;

		self.call(request, "Failed to create project").await.map(drop)
	}

	/// Deletes a project.
	pub async fn delete_project(&self, project_id: Id) -> Result<()> {
		let request = ApiRequest::delete(self.descriptor.project(&project_id.to_string()));

		self.call(request, "Failed to delete project").await.map(drop)
	}

	/// Adds the user with `email` to a project.
	pub async fn add_project_member(&self, project_id: Id, email: &str) -> Result<()> {
		let email = email.trim();
		let url = self.descriptor.project_member(&project_id.to_string(), email);
		let request = ApiRequest::post(url).json(&AddMemberBody { member_email: email })?;

		self.call(request, "Failed to add project member").await.map(drop)
	}

	/// Remembers `project` as the working project.
	pub async fn select_project(&self, project: Project) -> Result<()> {
		Ok(self.store.set_selected_project(project).await?)
	}

	/// Returns the remembered working project.
	pub async fn selected_project(&self) -> Result<Option<Project>> {
		Ok(self.store.selected_project().await?)
	}

	/// Forgets the remembered working project.
	pub async fn clear_selected_project(&self) -> Result<()> {
		Ok(self.store.clear_selected_project().await?)
	}
}
