//! Sprint planning operations.

// self
use crate::{
	_prelude::*,
	gateway::Gateway,
	http::{ApiHttpClient, ApiRequest},
	tracker::Id,
};

/// Project summary embedded in sprint payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SprintProject {
	/// Project id.
	pub id: Id,
	/// Display name.
	#[serde(default)]
	pub name: String,
}

/// Time-boxed iteration of a project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SprintWire", rename_all = "camelCase")]
pub struct Sprint {
	/// Sprint id.
	pub id: Id,
	/// Display name.
	pub name: String,
	/// First day, as sent by the backend.
	pub start_date: Option<String>,
	/// Last day, as sent by the backend.
	pub end_date: Option<String>,
	/// Owning project, when the payload embeds it.
	pub project: Option<SprintProject>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SprintWire {
	#[serde(default)]
	id: Option<Id>,
	#[serde(default)]
	sprint_id: Option<Id>,
	#[serde(default)]
	name: String,
	#[serde(default)]
	start_date: Option<String>,
	#[serde(default)]
	end_date: Option<String>,
	#[serde(default)]
	project: Option<SprintProject>,
}
impl TryFrom<SprintWire> for Sprint {
	type Error = String;

	fn try_from(wire: SprintWire) -> Result<Self, Self::Error> {
		let id = wire
			.id
			.or(wire.sprint_id)
			.ok_or_else(|| format!("sprint `{}` has neither `id` nor `sprintId`", wire.name))?;

		Ok(Self {
			id,
			name: wire.name,
			start_date: wire.start_date,
			end_date: wire.end_date,
			project: wire.project,
		})
	}
}

/// Body of sprint creation and update calls.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SprintRequest {
	/// Display name.
	pub name: String,
	/// First day, `YYYY-MM-DD`.
	pub start_date: String,
	/// Last day, `YYYY-MM-DD`.
	pub end_date: String,
}

impl<C> Gateway<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Lists the sprints of a project.
	pub async fn list_sprints(&self, project_id: Id) -> Result<Vec<Sprint>> {
		let request = ApiRequest::get(self.descriptor.project_sprints(&project_id.to_string()));

		self.call_json(request, "Failed to load sprints").await
	}

	/// Creates a sprint in a project.
	pub async fn create_sprint(&self, project_id: Id, request: &SprintRequest) -> Result<()> {
		let request = ApiRequest::post(self.descriptor.project_sprints(&project_id.to_string()))
			.json(request)?;

		self.call(request, "Failed to create sprint").await.map(drop)
	}

	/// Renames or reschedules a sprint.
	pub async fn update_sprint(
		&self,
		project_id: Id,
		sprint_id: Id,
		request: &SprintRequest,
	) -> Result<()> {
		let request = ApiRequest::put(
			self.descriptor.sprint(&project_id.to_string(), &sprint_id.to_string()),
		)
		.json(request)?;

		self.call(request, "Failed to update sprint").await.map(drop)
	}

	/// Deletes a sprint.
	pub async fn delete_sprint(&self, project_id: Id, sprint_id: Id) -> Result<()> {
		let request = ApiRequest::delete(
			self.descriptor.sprint(&project_id.to_string(), &sprint_id.to_string()),
		);

		self.call(request, "Failed to delete sprint").await.map(drop)
	}
}
